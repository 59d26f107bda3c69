pub mod assessments;
pub mod blog_posts;
pub mod models;
pub mod projects;
pub mod stats;
pub mod writers;

use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::ApiError;
use crate::slug;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| sqlx::Error::Configuration("DATABASE_URL not set".into()))?;

    tracing::info!("Initializing database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

pub async fn health_check(pool: Option<&PgPool>) -> Result<std::time::Duration, sqlx::Error> {
    let pool =
        pool.ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool).await?;

    Ok(start.elapsed())
}

/// Tables that own a unique slug column.
#[derive(Debug, Clone, Copy)]
pub enum SlugTable {
    Projects,
    BlogPosts,
    Assessments,
}

impl SlugTable {
    fn as_str(&self) -> &'static str {
        match self {
            SlugTable::Projects => "projects",
            SlugTable::BlogPosts => "blog_posts",
            SlugTable::Assessments => "assessments",
        }
    }
}

/// Slug to store when an entity is updated.
///
/// An unchanged title keeps the stored slug verbatim. A new title gets a fresh
/// slug; if another row already owns it a millisecond timestamp is appended.
pub async fn resolve_update_slug(
    conn: &mut PgConnection,
    table: SlugTable,
    id: i32,
    current_title: &str,
    current_slug: &str,
    new_title: &str,
) -> Result<String, ApiError> {
    if new_title == current_title {
        return Ok(current_slug.to_string());
    }

    let base = slug::slugify(new_title);
    if base.is_empty() {
        return Err(ApiError::validation(
            "Title must contain at least one letter or digit",
        ));
    }

    let taken_by_other: Option<(i32,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE slug = $1 AND id <> $2",
        table.as_str()
    ))
    .bind(&base)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    if taken_by_other.is_some() {
        let suffixed = slug::with_timestamp_suffix(&base, chrono::Utc::now().timestamp_millis());
        tracing::info!("Slug {} already taken, using {}", base, suffixed);
        return Ok(suffixed);
    }

    Ok(base)
}

/// Slug for a new entity; collisions surface later as a unique violation.
pub fn create_slug(title: &str) -> Result<String, ApiError> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return Err(ApiError::validation(
            "Title must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

/// Pattern for a case-insensitive substring match with LIKE metacharacters escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Comma-separated filter value → trimmed, non-empty terms.
pub fn split_terms(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Highest page number accepted; keeps `offset` far from overflow.
pub const MAX_PAGE: i64 = 1_000_000;

/// Page number and size after clamping.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            page_size: page_size.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn push_limit(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" LIMIT ")
            .push_bind(self.page_size)
            .push(" OFFSET ")
            .push_bind(self.offset());
    }
}

const SCHEMA: &[&str] = &[
    r#"
    DO $$ BEGIN
        CREATE TYPE project_status AS ENUM ('LIVE', 'IN_PROGRESS', 'ARCHIVED');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    DO $$ BEGIN
        CREATE TYPE project_type AS ENUM ('PERSONAL', 'FREELANCE', 'DEVOPS');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    DO $$ BEGIN
        CREATE TYPE content_block_type AS ENUM
            ('PARAGRAPH', 'HEADING', 'CODE', 'IMAGE', 'CALLOUT', 'QUOTE', 'LIST', 'VIDEO');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    // Shared vocabularies
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        slug TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_tags (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        slug TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_categories (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        slug TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_series (
        id SERIAL PRIMARY KEY,
        name VARCHAR(200) UNIQUE NOT NULL,
        slug TEXT NOT NULL
    )
    "#,
    // Projects
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id SERIAL PRIMARY KEY,
        slug TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        subtitle TEXT,
        description TEXT,
        status project_status NOT NULL DEFAULT 'IN_PROGRESS',
        project_type project_type NOT NULL DEFAULT 'PERSONAL',
        hero_image TEXT,
        live_url TEXT,
        github_url TEXT,
        case_study_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_overviews (
        project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
        problem TEXT,
        solution TEXT,
        impact TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_metrics (
        project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
        duration TEXT,
        team_size INTEGER,
        role TEXT,
        users TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_technical_details (
        project_id INTEGER PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
        architecture TEXT,
        deployment TEXT,
        security TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_technologies (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name VARCHAR(100) NOT NULL,
        category VARCHAR(100),
        reason TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_screenshots (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        storage_key TEXT,
        caption TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_tags (
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (project_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_lessons (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_business_outcomes (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_improvements (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_next_steps (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_future_tools (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_performance_metrics (
        id SERIAL PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    "#,
    // Blog
    r#"
    CREATE TABLE IF NOT EXISTS blog_posts (
        id SERIAL PRIMARY KEY,
        slug TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        excerpt TEXT,
        meta_description TEXT,
        hero_image TEXT,
        social_image TEXT,
        read_time INTEGER NOT NULL DEFAULT 1,
        word_count INTEGER NOT NULL DEFAULT 0,
        views INTEGER NOT NULL DEFAULT 0,
        published_at TIMESTAMPTZ,
        author JSONB,
        category_id INTEGER REFERENCES blog_categories(id) ON DELETE SET NULL,
        series_id INTEGER REFERENCES blog_series(id) ON DELETE SET NULL,
        series_part INTEGER,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_content_blocks (
        id SERIAL PRIMARY KEY,
        post_id INTEGER NOT NULL REFERENCES blog_posts(id) ON DELETE CASCADE,
        client_id TEXT,
        block_type content_block_type NOT NULL,
        sort_order INTEGER NOT NULL,
        content TEXT,
        level INTEGER,
        language TEXT,
        image_url TEXT,
        image_alt TEXT,
        image_caption TEXT,
        image_alignment TEXT,
        callout_type TEXT,
        quote_author TEXT,
        list_style TEXT,
        list_items JSONB,
        video_url TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_post_tags (
        post_id INTEGER NOT NULL REFERENCES blog_posts(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES blog_tags(id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, tag_id)
    )
    "#,
    // Assessments
    r#"
    CREATE TABLE IF NOT EXISTS assessments (
        id SERIAL PRIMARY KEY,
        slug TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        main_image TEXT,
        published_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessment_content_blocks (
        id SERIAL PRIMARY KEY,
        assessment_id INTEGER NOT NULL REFERENCES assessments(id) ON DELETE CASCADE,
        client_id TEXT,
        block_type content_block_type NOT NULL,
        sort_order INTEGER NOT NULL,
        content TEXT,
        level INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessment_technologies (
        id SERIAL PRIMARY KEY,
        assessment_id INTEGER NOT NULL REFERENCES assessments(id) ON DELETE CASCADE,
        name VARCHAR(100) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessment_images (
        id SERIAL PRIMARY KEY,
        assessment_id INTEGER NOT NULL REFERENCES assessments(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        storage_key TEXT,
        alt TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessment_files (
        id SERIAL PRIMARY KEY,
        assessment_id INTEGER NOT NULL REFERENCES assessments(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        storage_key TEXT,
        name TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        size_bytes BIGINT NOT NULL DEFAULT 0,
        sort_order INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assessment_tags (
        assessment_id INTEGER NOT NULL REFERENCES assessments(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (assessment_id, tag_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_projects_updated_at ON projects(updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_project_technologies_project ON project_technologies(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_project_screenshots_project ON project_screenshots(project_id, sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_project_tags_tag ON project_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_blog_posts_published_at ON blog_posts(published_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_blog_content_blocks_post ON blog_content_blocks(post_id, sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_blog_post_tags_tag ON blog_post_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_assessments_published_at ON assessments(published_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_assessment_blocks_assessment ON assessment_content_blocks(assessment_id, sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_assessment_images_assessment ON assessment_images(assessment_id, sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_assessment_files_assessment ON assessment_files(assessment_id, sort_order)",
    "CREATE INDEX IF NOT EXISTS idx_assessment_tags_tag ON assessment_tags(tag_id)",
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
    }

    #[tokio::test]
    async fn test_health_check_fails_without_pool() {
        let result = health_check(None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("foo"), "%foo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(split_terms(Some("rust, web ,,")), vec!["rust", "web"]);
        assert!(split_terms(None).is_empty());
    }

    #[test]
    fn test_page_clamps() {
        let page = Page::new(Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_huge_page_is_capped() {
        let page = Page::new(Some(i64::MAX), Some(20));
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * 20);

        let page = Page::new(Some(i64::MIN), Some(i64::MAX));
        assert_eq!(page.offset(), 0);
        assert_eq!(page.page_size, 100);
    }

    #[test]
    fn test_create_slug_rejects_symbol_only_title() {
        assert!(create_slug("!!!").is_err());
        assert_eq!(create_slug("Demo App").unwrap(), "demo-app");
    }
}
