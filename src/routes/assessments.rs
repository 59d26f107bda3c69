use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{upload_optional, PageQuery};
use crate::db::assessments::{self, AssessmentFilter, AssessmentInput, AssessmentUploads};
use crate::db::models::{
    Assessment, AssessmentCard, AssessmentDetail, AssessmentListItem, ListResponse, SavedEntity,
    SuccessResponse,
};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::state::AppState;
use crate::storage::{Folder, MediaKind};

/// `files` take documents as well as images; every other slot is image-only.
async fn read_submission(
    state: &AppState,
    multipart: Multipart,
) -> Result<(AssessmentInput, AssessmentUploads), ApiError> {
    let mut form = EntityForm::from_multipart(multipart).await?;
    let input = AssessmentInput::from_form(&form)?;

    let main = form.take_file(&["mainImage", "heroImage"]);
    let images = form.take_files("images");
    let files = form.take_files("files");

    let storage = &state.storage;
    let uploads = AssessmentUploads {
        main_image: upload_optional(storage, main, Folder::Assessments, MediaKind::Image).await?,
        images: storage
            .upload_all(&images, Folder::Assessments, MediaKind::Image)
            .await?,
        files: storage
            .upload_all(&files, Folder::Assessments, MediaKind::Attachment)
            .await?,
    };
    Ok((input, uploads))
}

/// GET /api/assessments
pub async fn list_assessments(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<AssessmentFilter>,
) -> Result<Json<ListResponse<AssessmentListItem>>, ApiError> {
    Ok(Json(
        assessments::list(state.db()?, &filter, page.page()).await?,
    ))
}

/// GET /api/assessments/cards
pub async fn assessment_cards(
    State(state): State<AppState>,
    Query(filter): Query<AssessmentFilter>,
) -> Result<Json<Vec<AssessmentCard>>, ApiError> {
    Ok(Json(assessments::cards(state.db()?, &filter).await?))
}

pub async fn get_assessment_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<AssessmentDetail>, ApiError> {
    Ok(Json(assessments::find_by_slug(state.db()?, &slug).await?))
}

pub async fn get_assessment_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AssessmentDetail>, ApiError> {
    Ok(Json(assessments::find_by_id(state.db()?, id).await?))
}

/// POST /api/assessments
pub async fn create_assessment(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SavedEntity<Assessment>>), ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    let assessment = assessments::create(&pool, &input, &uploads).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedEntity {
            entity: assessment,
            new_slug: None,
        }),
    ))
}

/// PUT /api/assessments/slug/{slug}
pub async fn update_assessment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Json<SavedEntity<Assessment>>, ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    Ok(Json(
        assessments::update_by_slug(&pool, &slug, &input, &uploads).await?,
    ))
}

pub async fn delete_assessment_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    assessments::delete_by_slug(state.db()?, &slug).await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn delete_assessment_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SuccessResponse>, ApiError> {
    assessments::delete_by_id(state.db()?, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
