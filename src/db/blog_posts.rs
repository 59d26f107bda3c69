//! Blog post persistence.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::models::{
    BlogContentBlock, BlogPost, BlogPostCard, BlogPostDetail, BlogPostListItem, ListResponse,
    NamedRef, SavedEntity, SeriesView, TagLinkView, BLOG_POST_COLUMNS,
};
use super::writers::{self, clean_names, ChildTable, NameInput, TagLink, Vocabulary};
use super::{create_slug, like_pattern, resolve_update_slug, split_terms, Page, SlugTable};
use crate::content::{read_metrics, validate_blocks, ContentBlockInput, OrderedBlock};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::storage::StoredObject;

#[derive(Debug, Clone)]
pub struct BlogPostInput {
    pub title: String,
    pub excerpt: Option<String>,
    pub meta_description: Option<String>,
    /// Explicit values win over the ones derived from the blocks.
    pub read_time: Option<i32>,
    pub word_count: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<serde_json::Value>,
    pub category: Option<String>,
    pub series: Option<String>,
    pub series_part: Option<i32>,
    pub content_blocks: Vec<OrderedBlock>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogPostUploads {
    pub hero_image: Option<StoredObject>,
    pub social_image: Option<StoredObject>,
}

impl BlogPostInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            excerpt: None,
            meta_description: None,
            read_time: None,
            word_count: None,
            published_at: None,
            author: None,
            category: None,
            series: None,
            series_part: None,
            content_blocks: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn from_form(form: &EntityForm) -> Result<Self, ApiError> {
        let blocks: Vec<ContentBlockInput> = form.json_or_default("contentBlocks");
        let tags: Vec<NameInput> = form.json_or_default("tags");

        Ok(Self {
            title: form.required_text("title", "Title")?,
            excerpt: form.text("excerpt"),
            meta_description: form.text("metaDescription"),
            read_time: form.int("readTime").filter(|v| *v > 0),
            word_count: form.int("wordCount").filter(|v| *v >= 0),
            published_at: form.published_at("publishedAt")?,
            author: form.json("author"),
            category: form.text("category"),
            series: form.text("series"),
            series_part: form.int("seriesPart"),
            content_blocks: validate_blocks(blocks)?,
            tags: clean_names(tags.into_iter().map(NameInput::into_name)),
        })
    }

    /// `(word_count, read_time)` to store.
    pub fn metrics(&self) -> (i32, i32) {
        let (words, minutes) = read_metrics(&self.content_blocks);
        (
            self.word_count.unwrap_or(words),
            self.read_time.unwrap_or(minutes),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostFilter {
    pub search: Option<String>,
    #[serde(alias = "tags")]
    pub tag: Option<String>,
    pub category: Option<String>,
    pub series: Option<String>,
    pub published: Option<bool>,
}

impl BlogPostFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE 1 = 1");

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (b.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.excerpt ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR b.meta_description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        for tag in split_terms(self.tag.as_deref()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM blog_post_tags bt JOIN blog_tags t ON t.id = bt.tag_id \
                 WHERE bt.post_id = b.id AND lower(t.name) = lower(",
            )
            .push_bind(tag)
            .push("))");
        }

        if let Some(category) = self.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM blog_categories c \
                 WHERE c.id = b.category_id AND (lower(c.name) = lower(",
            )
            .push_bind(category.to_string())
            .push(") OR c.slug = ")
            .push_bind(category.to_string())
            .push("))");
        }

        if let Some(series) = self.series.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM blog_series s \
                 WHERE s.id = b.series_id AND (lower(s.name) = lower(",
            )
            .push_bind(series.to_string())
            .push(") OR s.slug = ")
            .push_bind(series.to_string())
            .push("))");
        }

        match self.published {
            Some(true) => {
                qb.push(" AND b.published_at IS NOT NULL AND b.published_at <= now()");
            }
            Some(false) => {
                qb.push(" AND (b.published_at IS NULL OR b.published_at > now())");
            }
            None => {}
        }
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn vocabulary_id(
    conn: &mut PgConnection,
    vocabulary: Vocabulary,
    name: Option<&str>,
) -> Result<Option<i32>, sqlx::Error> {
    match name {
        Some(name) => Ok(Some(writers::upsert_named(conn, vocabulary, name).await?)),
        None => Ok(None),
    }
}

pub async fn create(
    pool: &PgPool,
    input: &BlogPostInput,
    uploads: &BlogPostUploads,
) -> Result<BlogPost, ApiError> {
    let slug = create_slug(&input.title)?;
    let (word_count, read_time) = input.metrics();

    let mut tx = pool.begin().await?;

    let category_id = vocabulary_id(&mut tx, Vocabulary::Categories, input.category.as_deref()).await?;
    let series_id = vocabulary_id(&mut tx, Vocabulary::Series, input.series.as_deref()).await?;

    let post: BlogPost = sqlx::query_as(&format!(
        r#"
        INSERT INTO blog_posts (slug, title, excerpt, meta_description, hero_image, social_image,
                                read_time, word_count, published_at, author, category_id,
                                series_id, series_part)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {BLOG_POST_COLUMNS}
        "#
    ))
    .bind(&slug)
    .bind(&input.title)
    .bind(&input.excerpt)
    .bind(&input.meta_description)
    .bind(uploads.hero_image.as_ref().map(|o| o.url.clone()))
    .bind(uploads.social_image.as_ref().map(|o| o.url.clone()))
    .bind(read_time)
    .bind(word_count)
    .bind(input.published_at)
    .bind(&input.author)
    .bind(category_id)
    .bind(series_id)
    .bind(series_id.and(input.series_part))
    .fetch_one(&mut *tx)
    .await?;

    writers::insert_blog_content_blocks(&mut tx, post.id, &input.content_blocks).await?;
    writers::insert_tag_links(&mut tx, TagLink::BlogPost, post.id, &input.tags).await?;

    tx.commit().await?;

    tracing::info!(id = post.id, slug = %post.slug, "blog post created");
    Ok(post)
}

/// Full replace by slug. Images fall back to the stored URLs; `views` is kept.
pub async fn update_by_slug(
    pool: &PgPool,
    slug: &str,
    input: &BlogPostInput,
    uploads: &BlogPostUploads,
) -> Result<SavedEntity<BlogPost>, ApiError> {
    let (word_count, read_time) = input.metrics();

    let mut tx = pool.begin().await?;

    let current: BlogPost = sqlx::query_as(&format!(
        "SELECT {BLOG_POST_COLUMNS} FROM blog_posts WHERE slug = $1 FOR UPDATE"
    ))
    .bind(slug)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Blog post"))?;

    let new_slug = resolve_update_slug(
        &mut tx,
        SlugTable::BlogPosts,
        current.id,
        &current.title,
        &current.slug,
        &input.title,
    )
    .await?;

    let category_id = vocabulary_id(&mut tx, Vocabulary::Categories, input.category.as_deref()).await?;
    let series_id = vocabulary_id(&mut tx, Vocabulary::Series, input.series.as_deref()).await?;

    let hero_image = uploads
        .hero_image
        .as_ref()
        .map(|o| o.url.clone())
        .or(current.hero_image.clone());
    let social_image = uploads
        .social_image
        .as_ref()
        .map(|o| o.url.clone())
        .or(current.social_image.clone());

    let post: BlogPost = sqlx::query_as(&format!(
        r#"
        UPDATE blog_posts
        SET slug = $2, title = $3, excerpt = $4, meta_description = $5, hero_image = $6,
            social_image = $7, read_time = $8, word_count = $9, published_at = $10,
            author = $11, category_id = $12, series_id = $13, series_part = $14,
            updated_at = now()
        WHERE id = $1
        RETURNING {BLOG_POST_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(&new_slug)
    .bind(&input.title)
    .bind(&input.excerpt)
    .bind(&input.meta_description)
    .bind(&hero_image)
    .bind(&social_image)
    .bind(read_time)
    .bind(word_count)
    .bind(input.published_at)
    .bind(&input.author)
    .bind(category_id)
    .bind(series_id)
    .bind(series_id.and(input.series_part))
    .fetch_one(&mut *tx)
    .await?;

    writers::delete_children(&mut tx, ChildTable::BlogContentBlocks, post.id).await?;
    writers::delete_children(&mut tx, ChildTable::BlogPostTags, post.id).await?;

    writers::insert_blog_content_blocks(&mut tx, post.id, &input.content_blocks).await?;
    writers::insert_tag_links(&mut tx, TagLink::BlogPost, post.id, &input.tags).await?;

    tx.commit().await?;

    let changed = (new_slug != current.slug).then_some(new_slug);
    tracing::info!(id = post.id, slug = %post.slug, "blog post updated");
    Ok(SavedEntity {
        entity: post,
        new_slug: changed,
    })
}

pub async fn delete_by_slug(pool: &PgPool, slug: &str) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM blog_posts WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Blog post"));
    }
    tracing::info!(slug = %slug, "blog post deleted");
    Ok(())
}

pub async fn delete_by_id(pool: &PgPool, id: i32) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Blog post"));
    }
    tracing::info!(id, "blog post deleted");
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

async fn load_detail(pool: &PgPool, post: BlogPost) -> Result<BlogPostDetail, ApiError> {
    let content_blocks: Vec<BlogContentBlock> = sqlx::query_as(
        r#"
        SELECT id, client_id, block_type, sort_order, content, level, language, image_url,
               image_alt, image_caption, image_alignment, callout_type, quote_author,
               list_style, list_items, video_url
        FROM blog_content_blocks
        WHERE post_id = $1
        ORDER BY sort_order ASC, id ASC
        "#,
    )
    .bind(post.id)
    .fetch_all(pool)
    .await?;

    let tags: Vec<NamedRef> = sqlx::query_as(
        "SELECT t.id, t.name, t.slug FROM blog_post_tags bt JOIN blog_tags t ON t.id = bt.tag_id \
         WHERE bt.post_id = $1 ORDER BY t.name",
    )
    .bind(post.id)
    .fetch_all(pool)
    .await?;

    let category: Option<NamedRef> = match post.category_id {
        Some(id) => {
            sqlx::query_as("SELECT id, name, slug FROM blog_categories WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    let series: Option<NamedRef> = match post.series_id {
        Some(id) => {
            sqlx::query_as("SELECT id, name, slug FROM blog_series WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    let part = post.series_part;
    Ok(BlogPostDetail {
        post,
        content_blocks,
        tags: tags.into_iter().map(TagLinkView::from).collect(),
        category,
        series: series.map(|series| SeriesView { series, part }),
    })
}

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<BlogPostDetail, ApiError> {
    let post: BlogPost =
        sqlx::query_as(&format!("SELECT {BLOG_POST_COLUMNS} FROM blog_posts WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog post"))?;
    load_detail(pool, post).await
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<BlogPostDetail, ApiError> {
    let post: BlogPost =
        sqlx::query_as(&format!("SELECT {BLOG_POST_COLUMNS} FROM blog_posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog post"))?;
    load_detail(pool, post).await
}

pub async fn list(
    pool: &PgPool,
    filter: &BlogPostFilter,
    page: Page,
) -> Result<ListResponse<BlogPostListItem>, ApiError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blog_posts b");
    filter.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BLOG_POST_COLUMNS}, \
         ARRAY(SELECT t.name::text FROM blog_post_tags bt JOIN blog_tags t ON t.id = bt.tag_id \
               WHERE bt.post_id = b.id ORDER BY t.name) AS tags, \
         (SELECT c.name::text FROM blog_categories c WHERE c.id = b.category_id) AS category_name, \
         (SELECT s.name::text FROM blog_series s WHERE s.id = b.series_id) AS series_name \
         FROM blog_posts b"
    ));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY b.published_at DESC NULLS LAST, b.created_at DESC");
    page.push_limit(&mut qb);

    let items: Vec<BlogPostListItem> = qb.build_query_as().fetch_all(pool).await?;

    Ok(ListResponse {
        items,
        page: page.page,
        page_size: page.page_size,
        total,
    })
}

pub async fn cards(pool: &PgPool, filter: &BlogPostFilter) -> Result<Vec<BlogPostCard>, ApiError> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT b.id, b.title, b.slug, b.excerpt, b.hero_image, b.read_time, b.published_at, \
         (SELECT COUNT(*) FROM blog_post_tags x WHERE x.post_id = b.id) AS tag_count, \
         (SELECT COUNT(*) FROM blog_content_blocks x WHERE x.post_id = b.id) AS block_count \
         FROM blog_posts b",
    );
    filter.push_where(&mut qb);
    qb.push(" ORDER BY b.published_at DESC NULLS LAST, b.created_at DESC");

    Ok(qb.build_query_as().fetch_all(pool).await?)
}

/// Published posts for the feed, newest first.
pub async fn published_feed(pool: &PgPool, limit: i64) -> Result<Vec<BlogPost>, ApiError> {
    let posts = sqlx::query_as(&format!(
        "SELECT {BLOG_POST_COLUMNS} FROM blog_posts \
         WHERE published_at IS NOT NULL AND published_at <= now() \
         ORDER BY published_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_derived_from_blocks_unless_given() {
        let mut form = EntityForm::default();
        form.insert_text("title", "Hello");
        let words = vec!["word"; 450].join(" ");
        form.insert_text(
            "contentBlocks",
            serde_json::json!([{ "id": "b1", "type": "PARAGRAPH", "order": 0, "content": words }])
                .to_string(),
        );
        let input = BlogPostInput::from_form(&form).unwrap();
        assert_eq!(input.metrics(), (450, 3));

        form.insert_text("readTime", "7");
        let input = BlogPostInput::from_form(&form).unwrap();
        assert_eq!(input.metrics(), (450, 7));
    }

    #[test]
    fn test_invalid_block_is_rejected() {
        let mut form = EntityForm::default();
        form.insert_text("title", "Hello");
        form.insert_text("contentBlocks", r#"[{"type":"IMAGE","order":0}]"#);
        assert!(matches!(
            BlogPostInput::from_form(&form),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_published_at_is_null() {
        let mut form = EntityForm::default();
        form.insert_text("title", "Hello");
        form.insert_text("publishedAt", "");
        form.insert_text("author", r#"{"name":"Ada"}"#);
        let input = BlogPostInput::from_form(&form).unwrap();
        assert!(input.published_at.is_none());
        assert_eq!(input.author.unwrap()["name"], "Ada");
    }

    #[test]
    fn test_filter_published_clause() {
        let filter = BlogPostFilter {
            published: Some(true),
            category: Some("Rust".to_string()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blog_posts b");
        filter.push_where(&mut qb);
        assert!(qb.sql().contains("b.published_at <= now()"));
        assert!(qb.sql().contains("blog_categories"));
    }
}
