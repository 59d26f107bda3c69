/**
 * Blog Routes
 * Public reads and multipart create/update for blog posts
 */
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{upload_optional, PageQuery};
use crate::db::blog_posts::{self, BlogPostFilter, BlogPostInput, BlogPostUploads};
use crate::db::models::{
    BlogPost, BlogPostCard, BlogPostDetail, BlogPostListItem, ListResponse, SavedEntity,
    SuccessResponse,
};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::state::AppState;
use crate::storage::{Folder, MediaKind};

// ============================================================================
// Form handling
// ============================================================================

async fn read_submission(
    state: &AppState,
    multipart: Multipart,
) -> Result<(BlogPostInput, BlogPostUploads), ApiError> {
    let mut form = EntityForm::from_multipart(multipart).await?;
    let input = BlogPostInput::from_form(&form)?;

    let hero = form.take_file(&["heroImage"]);
    let social = form.take_file(&["socialImage"]);

    let uploads = BlogPostUploads {
        hero_image: upload_optional(&state.storage, hero, Folder::Blog, MediaKind::Image).await?,
        social_image: upload_optional(&state.storage, social, Folder::Blog, MediaKind::Image)
            .await?,
    };
    Ok((input, uploads))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blog - List blog posts with pagination
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<BlogPostFilter>,
) -> Result<Json<ListResponse<BlogPostListItem>>, ApiError> {
    Ok(Json(blog_posts::list(state.db()?, &filter, page.page()).await?))
}

/// GET /api/blog/cards
pub async fn post_cards(
    State(state): State<AppState>,
    Query(filter): Query<BlogPostFilter>,
) -> Result<Json<Vec<BlogPostCard>>, ApiError> {
    Ok(Json(blog_posts::cards(state.db()?, &filter).await?))
}

/// GET /api/blog/slug/{slug}
pub async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPostDetail>, ApiError> {
    Ok(Json(blog_posts::find_by_slug(state.db()?, &slug).await?))
}

/// GET /api/blog/{id}
pub async fn get_post_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BlogPostDetail>, ApiError> {
    Ok(Json(blog_posts::find_by_id(state.db()?, id).await?))
}

/// POST /api/blog - Create a new blog post
pub async fn create_post(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SavedEntity<BlogPost>>), ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    let post = blog_posts::create(&pool, &input, &uploads).await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedEntity {
            entity: post,
            new_slug: None,
        }),
    ))
}

/// PUT /api/blog/slug/{slug} - Replace a blog post
pub async fn update_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Json<SavedEntity<BlogPost>>, ApiError> {
    let pool = state.db()?.clone();
    let (input, uploads) = read_submission(&state, multipart).await?;
    Ok(Json(
        blog_posts::update_by_slug(&pool, &slug, &input, &uploads).await?,
    ))
}

/// DELETE /api/blog/slug/{slug}
pub async fn delete_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    blog_posts::delete_by_slug(state.db()?, &slug).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/blog/{id}
pub async fn delete_post_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SuccessResponse>, ApiError> {
    blog_posts::delete_by_id(state.db()?, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
