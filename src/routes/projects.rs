/**
 * Project Routes
 * Public reads and multipart create/update for portfolio projects
 */
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{upload_optional, PageQuery};
use crate::db::models::{
    ListResponse, Project, ProjectCard, ProjectDetail, ProjectListItem, SavedEntity,
    SuccessResponse,
};
use crate::db::projects::{self, ProjectFilter, ProjectInput, ProjectUploads};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::state::AppState;
use crate::storage::{Folder, MediaKind};

/// Parse the form, then store its files. Nothing is uploaded for an invalid form.
async fn read_submission(
    state: &AppState,
    multipart: Multipart,
) -> Result<(ProjectInput, ProjectUploads), ApiError> {
    let mut form = EntityForm::from_multipart(multipart).await?;
    let input = ProjectInput::from_form(&form)?;

    let hero = form.take_file(&["heroImage", "mainImage"]);
    let mut screenshots = form.take_files("screenshots");
    if screenshots.is_empty() {
        screenshots = form.take_files("images");
    }

    let uploads = ProjectUploads {
        hero_image: upload_optional(&state.storage, hero, Folder::Projects, MediaKind::Image)
            .await?,
        screenshots: state
            .storage
            .upload_all(&screenshots, Folder::Projects, MediaKind::Image)
            .await?,
    };
    Ok((input, uploads))
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<ListResponse<ProjectListItem>>, ApiError> {
    Ok(Json(projects::list(state.db()?, &filter, page.page()).await?))
}

/// GET /api/projects/cards
pub async fn project_cards(
    State(state): State<AppState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<Vec<ProjectCard>>, ApiError> {
    Ok(Json(projects::cards(state.db()?, &filter).await?))
}

/// GET /api/projects/slug/{slug}
pub async fn get_project_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectDetail>, ApiError> {
    Ok(Json(projects::find_by_slug(state.db()?, &slug).await?))
}

/// GET /api/projects/{id}
pub async fn get_project_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProjectDetail>, ApiError> {
    Ok(Json(projects::find_by_id(state.db()?, id).await?))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SavedEntity<Project>>), ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    let project = projects::create(&pool, &input, &uploads).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedEntity {
            entity: project,
            new_slug: None,
        }),
    ))
}

/// PUT /api/projects/slug/{slug}
pub async fn update_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Json<SavedEntity<Project>>, ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    Ok(Json(
        projects::update_by_slug(&pool, &slug, &input, &uploads).await?,
    ))
}

/// DELETE /api/projects/slug/{slug}
pub async fn delete_project_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    projects::delete_by_slug(state.db()?, &slug).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/projects/{id}
pub async fn delete_project_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SuccessResponse>, ApiError> {
    projects::delete_by_id(state.db()?, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
