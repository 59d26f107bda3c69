//! Dashboard summary queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;

#[derive(Debug, Clone, Default, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCounts {
    pub projects: i64,
    pub blog_posts: i64,
    pub assessments: i64,
    pub tags: i64,
    pub blog_tags: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub counts: ContentCounts,
    pub recent_projects: Vec<RecentItem>,
    pub recent_blog_posts: Vec<RecentItem>,
    pub recent_assessments: Vec<RecentItem>,
}

const RECENT_LIMIT: i64 = 5;

async fn recent(pool: &PgPool, table: &str) -> Result<Vec<RecentItem>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT id, title, slug, updated_at FROM {table} ORDER BY updated_at DESC, id DESC LIMIT $1"
    ))
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await
}

pub async fn dashboard(pool: &PgPool) -> Result<DashboardStats, ApiError> {
    let counts: ContentCounts = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM projects) AS projects,
            (SELECT COUNT(*) FROM blog_posts) AS blog_posts,
            (SELECT COUNT(*) FROM assessments) AS assessments,
            (SELECT COUNT(*) FROM tags) AS tags,
            (SELECT COUNT(*) FROM blog_tags) AS blog_tags
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        counts,
        recent_projects: recent(pool, "projects").await?,
        recent_blog_posts: recent(pool, "blog_posts").await?,
        recent_assessments: recent(pool, "assessments").await?,
    })
}
