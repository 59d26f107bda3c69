//! Assessment persistence.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{
    Assessment, AssessmentCard, AssessmentContentBlock, AssessmentDetail, AssessmentFile,
    AssessmentImage, AssessmentListItem, AssessmentTechnology, ListResponse, NamedRef,
    SavedEntity, TagLinkView, ASSESSMENT_COLUMNS,
};
use super::writers::{self, clean_names, ChildTable, NameInput, TagLink};
use super::{create_slug, like_pattern, resolve_update_slug, split_terms, Page, SlugTable};
use crate::content::{validate_assessment_blocks, ContentBlockInput, OrderedBlock};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::storage::StoredObject;

#[derive(Debug, Clone)]
pub struct AssessmentInput {
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_blocks: Vec<OrderedBlock>,
    pub technologies: Vec<String>,
    pub tags: Vec<String>,
}

/// Files already stored for this write. Empty `images`/`files` on update keep the stored rows.
#[derive(Debug, Clone, Default)]
pub struct AssessmentUploads {
    pub main_image: Option<StoredObject>,
    pub images: Vec<StoredObject>,
    pub files: Vec<StoredObject>,
}

impl AssessmentInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            published_at: None,
            content_blocks: Vec::new(),
            technologies: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn from_form(form: &EntityForm) -> Result<Self, ApiError> {
        let blocks: Vec<ContentBlockInput> = form.json_or_default("contentBlocks");
        let technologies: Vec<NameInput> = form.json_or_default("technologies");
        let tags: Vec<NameInput> = form.json_or_default("tags");

        Ok(Self {
            title: form.required_text("title", "Title")?,
            description: form.text("description"),
            published_at: form.published_at("publishedAt")?,
            content_blocks: validate_assessment_blocks(blocks)?,
            technologies: technologies
                .into_iter()
                .map(|t| t.into_name().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            tags: clean_names(tags.into_iter().map(NameInput::into_name)),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentFilter {
    pub search: Option<String>,
    #[serde(alias = "tags")]
    pub tag: Option<String>,
    #[serde(alias = "technologies")]
    pub technology: Option<String>,
}

impl AssessmentFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE 1 = 1");

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (a.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR a.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        for tag in split_terms(self.tag.as_deref()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM assessment_tags ag JOIN tags t ON t.id = ag.tag_id \
                 WHERE ag.assessment_id = a.id AND lower(t.name) = lower(",
            )
            .push_bind(tag)
            .push("))");
        }

        for tech in split_terms(self.technology.as_deref()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM assessment_technologies x \
                 WHERE x.assessment_id = a.id AND lower(x.name) = lower(",
            )
            .push_bind(tech)
            .push("))");
        }
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn write_children(
    conn: &mut sqlx::PgConnection,
    assessment_id: i32,
    input: &AssessmentInput,
    uploads: &AssessmentUploads,
) -> Result<(), sqlx::Error> {
    writers::insert_assessment_content_blocks(conn, assessment_id, &input.content_blocks).await?;
    writers::insert_assessment_technologies(conn, assessment_id, &input.technologies).await?;
    writers::insert_assessment_images(conn, assessment_id, &uploads.images).await?;
    writers::insert_assessment_files(conn, assessment_id, &uploads.files).await?;
    writers::insert_tag_links(conn, TagLink::Assessment, assessment_id, &input.tags).await?;
    Ok(())
}

pub async fn create(
    pool: &PgPool,
    input: &AssessmentInput,
    uploads: &AssessmentUploads,
) -> Result<Assessment, ApiError> {
    let slug = create_slug(&input.title)?;

    let mut tx = pool.begin().await?;

    let assessment: Assessment = sqlx::query_as(&format!(
        r#"
        INSERT INTO assessments (slug, title, description, main_image, published_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ASSESSMENT_COLUMNS}
        "#
    ))
    .bind(&slug)
    .bind(&input.title)
    .bind(&input.description)
    .bind(uploads.main_image.as_ref().map(|o| o.url.clone()))
    .bind(input.published_at)
    .fetch_one(&mut *tx)
    .await?;

    write_children(&mut tx, assessment.id, input, uploads).await?;

    tx.commit().await?;

    tracing::info!(id = assessment.id, slug = %assessment.slug, "assessment created");
    Ok(assessment)
}

pub async fn update_by_slug(
    pool: &PgPool,
    slug: &str,
    input: &AssessmentInput,
    uploads: &AssessmentUploads,
) -> Result<SavedEntity<Assessment>, ApiError> {
    let mut tx = pool.begin().await?;

    let current: Assessment = sqlx::query_as(&format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE slug = $1 FOR UPDATE"
    ))
    .bind(slug)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Assessment"))?;

    let new_slug = resolve_update_slug(
        &mut tx,
        SlugTable::Assessments,
        current.id,
        &current.title,
        &current.slug,
        &input.title,
    )
    .await?;

    let main_image = uploads
        .main_image
        .as_ref()
        .map(|o| o.url.clone())
        .or(current.main_image.clone());

    let assessment: Assessment = sqlx::query_as(&format!(
        r#"
        UPDATE assessments
        SET slug = $2, title = $3, description = $4, main_image = $5, published_at = $6,
            updated_at = now()
        WHERE id = $1
        RETURNING {ASSESSMENT_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(&new_slug)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&main_image)
    .bind(input.published_at)
    .fetch_one(&mut *tx)
    .await?;

    for child in [
        ChildTable::AssessmentContentBlocks,
        ChildTable::AssessmentTechnologies,
        ChildTable::AssessmentTags,
    ] {
        writers::delete_children(&mut tx, child, assessment.id).await?;
    }
    if !uploads.images.is_empty() {
        writers::delete_children(&mut tx, ChildTable::AssessmentImages, assessment.id).await?;
    }
    if !uploads.files.is_empty() {
        writers::delete_children(&mut tx, ChildTable::AssessmentFiles, assessment.id).await?;
    }

    write_children(&mut tx, assessment.id, input, uploads).await?;

    tx.commit().await?;

    let changed = (new_slug != current.slug).then_some(new_slug);
    tracing::info!(id = assessment.id, slug = %assessment.slug, "assessment updated");
    Ok(SavedEntity {
        entity: assessment,
        new_slug: changed,
    })
}

pub async fn delete_by_slug(pool: &PgPool, slug: &str) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM assessments WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Assessment"));
    }
    tracing::info!(slug = %slug, "assessment deleted");
    Ok(())
}

pub async fn delete_by_id(pool: &PgPool, id: i32) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM assessments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Assessment"));
    }
    tracing::info!(id, "assessment deleted");
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

async fn load_detail(pool: &PgPool, assessment: Assessment) -> Result<AssessmentDetail, ApiError> {
    let id = assessment.id;

    let content_blocks: Vec<AssessmentContentBlock> = sqlx::query_as(
        "SELECT id, client_id, block_type, sort_order, content, level \
         FROM assessment_content_blocks WHERE assessment_id = $1 ORDER BY sort_order ASC, id ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let technologies: Vec<AssessmentTechnology> = sqlx::query_as(
        "SELECT id, name FROM assessment_technologies WHERE assessment_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let images: Vec<AssessmentImage> = sqlx::query_as(
        "SELECT id, url, storage_key, alt, sort_order FROM assessment_images \
         WHERE assessment_id = $1 ORDER BY sort_order, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let files: Vec<AssessmentFile> = sqlx::query_as(
        "SELECT id, url, storage_key, name, mime_type, size_bytes, sort_order FROM assessment_files \
         WHERE assessment_id = $1 ORDER BY sort_order, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let tags: Vec<NamedRef> = sqlx::query_as(
        "SELECT t.id, t.name, t.slug FROM assessment_tags ag JOIN tags t ON t.id = ag.tag_id \
         WHERE ag.assessment_id = $1 ORDER BY t.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(AssessmentDetail {
        assessment,
        content_blocks,
        technologies,
        images,
        files,
        assessment_tags: tags.into_iter().map(TagLinkView::from).collect(),
    })
}

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<AssessmentDetail, ApiError> {
    let assessment: Assessment =
        sqlx::query_as(&format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Assessment"))?;
    load_detail(pool, assessment).await
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<AssessmentDetail, ApiError> {
    let assessment: Assessment =
        sqlx::query_as(&format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Assessment"))?;
    load_detail(pool, assessment).await
}

pub async fn list(
    pool: &PgPool,
    filter: &AssessmentFilter,
    page: Page,
) -> Result<ListResponse<AssessmentListItem>, ApiError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assessments a");
    filter.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {ASSESSMENT_COLUMNS}, \
         ARRAY(SELECT t.name::text FROM assessment_tags ag JOIN tags t ON t.id = ag.tag_id \
               WHERE ag.assessment_id = a.id ORDER BY t.name) AS tags, \
         ARRAY(SELECT x.name::text FROM assessment_technologies x \
               WHERE x.assessment_id = a.id ORDER BY x.id) AS technologies \
         FROM assessments a"
    ));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY a.published_at DESC NULLS LAST, a.created_at DESC");
    page.push_limit(&mut qb);

    let items: Vec<AssessmentListItem> = qb.build_query_as().fetch_all(pool).await?;

    Ok(ListResponse {
        items,
        page: page.page,
        page_size: page.page_size,
        total,
    })
}

pub async fn cards(
    pool: &PgPool,
    filter: &AssessmentFilter,
) -> Result<Vec<AssessmentCard>, ApiError> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT a.id, a.title, a.slug, a.main_image, a.published_at, \
         (SELECT COUNT(*) FROM assessment_technologies x WHERE x.assessment_id = a.id) AS technology_count, \
         (SELECT COUNT(*) FROM assessment_images x WHERE x.assessment_id = a.id) AS image_count, \
         (SELECT COUNT(*) FROM assessment_files x WHERE x.assessment_id = a.id) AS file_count \
         FROM assessments a",
    );
    filter.push_where(&mut qb);
    qb.push(" ORDER BY a.published_at DESC NULLS LAST, a.created_at DESC");

    Ok(qb.build_query_as().fetch_all(pool).await?)
}
