//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Live,
    InProgress,
    Archived,
}

impl ProjectStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIVE" => Some(ProjectStatus::Live),
            "IN_PROGRESS" => Some(ProjectStatus::InProgress),
            "ARCHIVED" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    Personal,
    Freelance,
    Devops,
}

impl ProjectType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERSONAL" => Some(ProjectType::Personal),
            "FREELANCE" => Some(ProjectType::Freelance),
            "DEVOPS" => Some(ProjectType::Devops),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_block_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Paragraph,
    Heading,
    Code,
    Image,
    Callout,
    Quote,
    List,
    Video,
}

impl BlockType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PARAGRAPH" => Some(BlockType::Paragraph),
            "HEADING" => Some(BlockType::Heading),
            "CODE" => Some(BlockType::Code),
            "IMAGE" => Some(BlockType::Image),
            "CALLOUT" => Some(BlockType::Callout),
            "QUOTE" => Some(BlockType::Quote),
            "LIST" => Some(BlockType::List),
            "VIDEO" => Some(BlockType::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "PARAGRAPH",
            BlockType::Heading => "HEADING",
            BlockType::Code => "CODE",
            BlockType::Image => "IMAGE",
            BlockType::Callout => "CALLOUT",
            BlockType::Quote => "QUOTE",
            BlockType::List => "LIST",
            BlockType::Video => "VIDEO",
        }
    }
}

// ============================================================================
// Shared vocabulary
// ============================================================================

/// Row of `tags`, `blog_tags`, `blog_categories` or `blog_series`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

/// Join-row view: `{ "tag": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagLinkView {
    pub tag: NamedRef,
}

impl From<NamedRef> for TagLinkView {
    fn from(tag: NamedRef) -> Self {
        Self { tag }
    }
}

/// Row of any single-description child table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DescriptionRow {
    pub id: i32,
    pub description: String,
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub hero_image: Option<String>,
    pub live_url: Option<String>,
    pub github_url: Option<String>,
    pub case_study_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const PROJECT_COLUMNS: &str = "id, slug, title, subtitle, description, status, project_type, \
     hero_image, live_url, github_url, case_study_url, created_at, updated_at";

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOverview {
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub impact: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub team_size: Option<i32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub users: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTechnicalDetails {
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub security: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectTechnology {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: i32,
    pub url: String,
    pub storage_key: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// Full project graph returned by the detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub overview: Option<ProjectOverview>,
    pub metrics: Option<ProjectMetrics>,
    pub technical_details: Option<ProjectTechnicalDetails>,
    pub technologies: Vec<ProjectTechnology>,
    pub screenshots: Vec<Screenshot>,
    pub project_tags: Vec<TagLinkView>,
    pub lessons: Vec<DescriptionRow>,
    pub business_outcomes: Vec<DescriptionRow>,
    pub improvements: Vec<DescriptionRow>,
    pub next_steps: Vec<DescriptionRow>,
    pub future_tools: Vec<DescriptionRow>,
    pub performance_metrics: Vec<DescriptionRow>,
}

/// List row: the parent plus tag and technology names.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub tags: Vec<String>,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCard {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub hero_image: Option<String>,
    pub status: ProjectStatus,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub technology_count: i64,
    pub tag_count: i64,
    pub screenshot_count: i64,
}

// ============================================================================
// Blog
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub meta_description: Option<String>,
    pub hero_image: Option<String>,
    pub social_image: Option<String>,
    pub read_time: i32,
    pub word_count: i32,
    pub views: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<serde_json::Value>,
    pub category_id: Option<i32>,
    pub series_id: Option<i32>,
    pub series_part: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const BLOG_POST_COLUMNS: &str = "id, slug, title, excerpt, meta_description, hero_image, \
     social_image, read_time, word_count, views, published_at, author, category_id, series_id, \
     series_part, created_at, updated_at";

/// Stored blog block: one wide row, only the variant's columns are set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogContentBlock {
    #[serde(skip)]
    pub id: i32,
    #[serde(rename = "id")]
    pub client_id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub content: Option<String>,
    pub level: Option<i32>,
    pub language: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub image_caption: Option<String>,
    pub image_alignment: Option<String>,
    pub callout_type: Option<String>,
    pub quote_author: Option<String>,
    pub list_style: Option<String>,
    pub list_items: Option<serde_json::Value>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesView {
    #[serde(flatten)]
    pub series: NamedRef,
    pub part: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostDetail {
    #[serde(flatten)]
    pub post: BlogPost,
    pub content_blocks: Vec<BlogContentBlock>,
    pub tags: Vec<TagLinkView>,
    pub category: Option<NamedRef>,
    pub series: Option<SeriesView>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: BlogPost,
    pub tags: Vec<String>,
    pub category_name: Option<String>,
    pub series_name: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostCard {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub hero_image: Option<String>,
    pub read_time: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub tag_count: i64,
    pub block_count: i64,
}

// ============================================================================
// Assessments
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub main_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ASSESSMENT_COLUMNS: &str =
    "id, slug, title, description, main_image, published_at, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentContentBlock {
    #[serde(skip)]
    pub id: i32,
    #[serde(rename = "id")]
    pub client_id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub content: Option<String>,
    pub level: Option<i32>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssessmentTechnology {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentImage {
    pub id: i32,
    pub url: String,
    pub storage_key: Option<String>,
    pub alt: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentFile {
    pub id: i32,
    pub url: String,
    pub storage_key: Option<String>,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDetail {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub content_blocks: Vec<AssessmentContentBlock>,
    pub technologies: Vec<AssessmentTechnology>,
    pub images: Vec<AssessmentImage>,
    pub files: Vec<AssessmentFile>,
    pub assessment_tags: Vec<TagLinkView>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub assessment: Assessment,
    pub tags: Vec<String>,
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentCard {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub main_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub technology_count: i64,
    pub image_count: i64,
    pub file_count: i64,
}

// ============================================================================
// Responses
// ============================================================================

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Create/update response: the stored parent row, plus `newSlug` when an update changed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedEntity<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_slug: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!(ProjectStatus::parse("in_progress"), Some(ProjectStatus::InProgress));
        assert_eq!(ProjectType::parse("DevOps"), Some(ProjectType::Devops));
        assert_eq!(BlockType::parse("video"), Some(BlockType::Video));
        assert_eq!(ProjectStatus::parse("draft"), None);
    }

    #[test]
    fn test_enum_serialization_matches_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(serde_json::to_string(&ProjectType::Devops).unwrap(), "\"DEVOPS\"");
    }

    #[test]
    fn test_tag_link_view_shape() {
        let view = TagLinkView::from(NamedRef {
            id: 1,
            name: "Frontend".to_string(),
            slug: "frontend".to_string(),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["tag"]["name"], "Frontend");
    }

    #[test]
    fn test_content_block_serializes_client_id_as_id() {
        let block = BlogContentBlock {
            id: 77,
            client_id: Some("blk-1".to_string()),
            block_type: BlockType::Heading,
            sort_order: 0,
            content: Some("Intro".to_string()),
            level: Some(2),
            language: None,
            image_url: None,
            image_alt: None,
            image_caption: None,
            image_alignment: None,
            callout_type: None,
            quote_author: None,
            list_style: None,
            list_items: None,
            video_url: None,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["id"], "blk-1");
        assert_eq!(json["type"], "HEADING");
        assert_eq!(json["order"], 0);
    }
}
