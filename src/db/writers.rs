//! Child-collection writers.
//!
//! Every writer takes an open connection (normally a transaction), the parent
//! id and plain values, and only ever inserts. Replacing a collection is a
//! [`delete_children`] call followed by the writer.

use serde::Deserialize;
use sqlx::PgConnection;

use crate::content::OrderedBlock;
use crate::slug::slugify;
use crate::storage::StoredObject;

// ============================================================================
// Inputs
// ============================================================================

/// `"text"` or `{ "description": "text" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DescriptionInput {
    Text(String),
    Item { description: String },
}

impl DescriptionInput {
    pub fn into_text(self) -> String {
        match self {
            DescriptionInput::Text(text) => text,
            DescriptionInput::Item { description } => description,
        }
    }
}

/// `"name"` or `{ "name": "name" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NameInput {
    Text(String),
    Named { name: String },
}

impl NameInput {
    pub fn into_name(self) -> String {
        match self {
            NameInput::Text(name) => name,
            NameInput::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Technology {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `"React"` or `{ "name": "React", "category": ..., "reason": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TechnologyInput {
    Name(String),
    Full(Technology),
}

impl From<TechnologyInput> for Technology {
    fn from(input: TechnologyInput) -> Self {
        match input {
            TechnologyInput::Name(name) => Technology {
                name,
                ..Default::default()
            },
            TechnologyInput::Full(tech) => tech,
        }
    }
}

/// Trim, drop blanks, drop exact duplicates, keep first-seen order.
pub fn clean_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim().to_string();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Trim and drop blank descriptions. Duplicates are kept.
pub fn clean_descriptions(items: Vec<DescriptionInput>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.into_text().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

// ============================================================================
// Table selectors
// ============================================================================

/// Child tables keyed by a parent id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildTable {
    ProjectOverviews,
    ProjectMetrics,
    ProjectTechnicalDetails,
    ProjectTechnologies,
    ProjectScreenshots,
    ProjectTags,
    ProjectLessons,
    ProjectBusinessOutcomes,
    ProjectImprovements,
    ProjectNextSteps,
    ProjectFutureTools,
    ProjectPerformanceMetrics,
    BlogContentBlocks,
    BlogPostTags,
    AssessmentContentBlocks,
    AssessmentTechnologies,
    AssessmentImages,
    AssessmentFiles,
    AssessmentTags,
}

impl ChildTable {
    pub fn table(&self) -> &'static str {
        match self {
            ChildTable::ProjectOverviews => "project_overviews",
            ChildTable::ProjectMetrics => "project_metrics",
            ChildTable::ProjectTechnicalDetails => "project_technical_details",
            ChildTable::ProjectTechnologies => "project_technologies",
            ChildTable::ProjectScreenshots => "project_screenshots",
            ChildTable::ProjectTags => "project_tags",
            ChildTable::ProjectLessons => "project_lessons",
            ChildTable::ProjectBusinessOutcomes => "project_business_outcomes",
            ChildTable::ProjectImprovements => "project_improvements",
            ChildTable::ProjectNextSteps => "project_next_steps",
            ChildTable::ProjectFutureTools => "project_future_tools",
            ChildTable::ProjectPerformanceMetrics => "project_performance_metrics",
            ChildTable::BlogContentBlocks => "blog_content_blocks",
            ChildTable::BlogPostTags => "blog_post_tags",
            ChildTable::AssessmentContentBlocks => "assessment_content_blocks",
            ChildTable::AssessmentTechnologies => "assessment_technologies",
            ChildTable::AssessmentImages => "assessment_images",
            ChildTable::AssessmentFiles => "assessment_files",
            ChildTable::AssessmentTags => "assessment_tags",
        }
    }

    fn parent_column(&self) -> &'static str {
        match self {
            ChildTable::BlogContentBlocks | ChildTable::BlogPostTags => "post_id",
            ChildTable::AssessmentContentBlocks
            | ChildTable::AssessmentTechnologies
            | ChildTable::AssessmentImages
            | ChildTable::AssessmentFiles
            | ChildTable::AssessmentTags => "assessment_id",
            _ => "project_id",
        }
    }
}

/// Project collections that hold a single description column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionList {
    Lessons,
    BusinessOutcomes,
    Improvements,
    NextSteps,
    FutureTools,
    PerformanceMetrics,
}

impl DescriptionList {
    pub const ALL: [DescriptionList; 6] = [
        DescriptionList::Lessons,
        DescriptionList::BusinessOutcomes,
        DescriptionList::Improvements,
        DescriptionList::NextSteps,
        DescriptionList::FutureTools,
        DescriptionList::PerformanceMetrics,
    ];

    pub fn child_table(&self) -> ChildTable {
        match self {
            DescriptionList::Lessons => ChildTable::ProjectLessons,
            DescriptionList::BusinessOutcomes => ChildTable::ProjectBusinessOutcomes,
            DescriptionList::Improvements => ChildTable::ProjectImprovements,
            DescriptionList::NextSteps => ChildTable::ProjectNextSteps,
            DescriptionList::FutureTools => ChildTable::ProjectFutureTools,
            DescriptionList::PerformanceMetrics => ChildTable::ProjectPerformanceMetrics,
        }
    }
}

/// Shared vocabularies deduplicated by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    Tags,
    BlogTags,
    Categories,
    Series,
}

impl Vocabulary {
    pub fn table(&self) -> &'static str {
        match self {
            Vocabulary::Tags => "tags",
            Vocabulary::BlogTags => "blog_tags",
            Vocabulary::Categories => "blog_categories",
            Vocabulary::Series => "blog_series",
        }
    }
}

/// Join tables between a parent and a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLink {
    Project,
    BlogPost,
    Assessment,
}

impl TagLink {
    fn vocabulary(&self) -> Vocabulary {
        match self {
            TagLink::BlogPost => Vocabulary::BlogTags,
            TagLink::Project | TagLink::Assessment => Vocabulary::Tags,
        }
    }

    fn child_table(&self) -> ChildTable {
        match self {
            TagLink::Project => ChildTable::ProjectTags,
            TagLink::BlogPost => ChildTable::BlogPostTags,
            TagLink::Assessment => ChildTable::AssessmentTags,
        }
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Delete every row of one child table for a parent.
pub async fn delete_children(
    conn: &mut PgConnection,
    child: ChildTable,
    parent_id: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        child.table(),
        child.parent_column()
    ))
    .bind(parent_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_descriptions(
    conn: &mut PgConnection,
    list: DescriptionList,
    project_id: i32,
    items: &[String],
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (project_id, description) VALUES ($1, $2)",
        list.child_table().table()
    );
    for item in items.iter().filter(|i| !i.trim().is_empty()) {
        sqlx::query(&sql)
            .bind(project_id)
            .bind(item)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_project_technologies(
    conn: &mut PgConnection,
    project_id: i32,
    technologies: &[Technology],
) -> Result<(), sqlx::Error> {
    for tech in technologies.iter().filter(|t| !t.name.trim().is_empty()) {
        sqlx::query(
            "INSERT INTO project_technologies (project_id, name, category, reason) VALUES ($1, $2, $3, $4)",
        )
        .bind(project_id)
        .bind(tech.name.trim())
        .bind(&tech.category)
        .bind(&tech.reason)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_assessment_technologies(
    conn: &mut PgConnection,
    assessment_id: i32,
    names: &[String],
) -> Result<(), sqlx::Error> {
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        sqlx::query("INSERT INTO assessment_technologies (assessment_id, name) VALUES ($1, $2)")
            .bind(assessment_id)
            .bind(name.trim())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_project_screenshots(
    conn: &mut PgConnection,
    project_id: i32,
    screenshots: &[StoredObject],
) -> Result<(), sqlx::Error> {
    for (order, shot) in screenshots.iter().enumerate() {
        sqlx::query(
            "INSERT INTO project_screenshots (project_id, url, storage_key, caption, sort_order) \
             VALUES ($1, $2, $3, NULL, $4)",
        )
        .bind(project_id)
        .bind(&shot.url)
        .bind(&shot.key)
        .bind(order as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_assessment_images(
    conn: &mut PgConnection,
    assessment_id: i32,
    images: &[StoredObject],
) -> Result<(), sqlx::Error> {
    for (order, image) in images.iter().enumerate() {
        sqlx::query(
            "INSERT INTO assessment_images (assessment_id, url, storage_key, alt, sort_order) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(assessment_id)
        .bind(&image.url)
        .bind(&image.key)
        .bind(&image.original_filename)
        .bind(order as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_assessment_files(
    conn: &mut PgConnection,
    assessment_id: i32,
    files: &[StoredObject],
) -> Result<(), sqlx::Error> {
    for (order, file) in files.iter().enumerate() {
        sqlx::query(
            "INSERT INTO assessment_files \
             (assessment_id, url, storage_key, name, mime_type, size_bytes, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(assessment_id)
        .bind(&file.url)
        .bind(&file.key)
        .bind(&file.original_filename)
        .bind(&file.mime_type)
        .bind(file.size as i64)
        .bind(order as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Find-or-create a vocabulary entry by its unique name and return its id.
pub async fn upsert_named(
    conn: &mut PgConnection,
    vocabulary: Vocabulary,
    name: &str,
) -> Result<i32, sqlx::Error> {
    let (id,): (i32,) = sqlx::query_as(&format!(
        "INSERT INTO {} (name, slug) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
        vocabulary.table()
    ))
    .bind(name)
    .bind(slugify(name))
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Upsert each tag name into the link's vocabulary and create the join rows.
pub async fn insert_tag_links(
    conn: &mut PgConnection,
    link: TagLink,
    parent_id: i32,
    names: &[String],
) -> Result<(), sqlx::Error> {
    let child = link.child_table();
    let sql = format!(
        "INSERT INTO {} ({}, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        child.table(),
        child.parent_column()
    );
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let tag_id = upsert_named(conn, link.vocabulary(), name).await?;
        sqlx::query(&sql)
            .bind(parent_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_blog_content_blocks(
    conn: &mut PgConnection,
    post_id: i32,
    blocks: &[OrderedBlock],
) -> Result<(), sqlx::Error> {
    for block in blocks {
        let c = block.block.columns();
        sqlx::query(
            r#"
            INSERT INTO blog_content_blocks (
                post_id, client_id, block_type, sort_order, content, level, language,
                image_url, image_alt, image_caption, image_alignment, callout_type,
                quote_author, list_style, list_items, video_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(post_id)
        .bind(&block.client_id)
        .bind(block.block.block_type())
        .bind(block.order)
        .bind(c.content)
        .bind(c.level)
        .bind(c.language)
        .bind(c.image_url)
        .bind(c.image_alt)
        .bind(c.image_caption)
        .bind(c.image_alignment)
        .bind(c.callout_type)
        .bind(c.quote_author)
        .bind(c.list_style)
        .bind(c.list_items)
        .bind(c.video_url)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_assessment_content_blocks(
    conn: &mut PgConnection,
    assessment_id: i32,
    blocks: &[OrderedBlock],
) -> Result<(), sqlx::Error> {
    for block in blocks {
        let c = block.block.columns();
        sqlx::query(
            "INSERT INTO assessment_content_blocks \
             (assessment_id, client_id, block_type, sort_order, content, level) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(assessment_id)
        .bind(&block.client_id)
        .bind(block.block.block_type())
        .bind(block.order)
        .bind(c.content)
        .bind(c.level)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_input_accepts_both_shapes() {
        let items: Vec<DescriptionInput> =
            serde_json::from_str(r#"["Ship early", {"description": " Test more "}, "  "]"#)
                .unwrap();
        assert_eq!(clean_descriptions(items), vec!["Ship early", "Test more"]);
    }

    #[test]
    fn test_technology_input_accepts_both_shapes() {
        let items: Vec<TechnologyInput> =
            serde_json::from_str(r#"["Rust", {"name": "React", "reason": "UI"}]"#).unwrap();
        let techs: Vec<Technology> = items.into_iter().map(Technology::from).collect();
        assert_eq!(techs[0].name, "Rust");
        assert_eq!(techs[1].reason.as_deref(), Some("UI"));
    }

    #[test]
    fn test_clean_names_dedupes_and_trims() {
        let names = clean_names(vec![
            " Frontend".to_string(),
            "Frontend".to_string(),
            "".to_string(),
            "Rust".to_string(),
        ]);
        assert_eq!(names, vec!["Frontend", "Rust"]);
    }

    #[test]
    fn test_child_tables_use_matching_parent_column() {
        assert_eq!(ChildTable::BlogPostTags.parent_column(), "post_id");
        assert_eq!(ChildTable::AssessmentFiles.parent_column(), "assessment_id");
        assert_eq!(ChildTable::ProjectFutureTools.parent_column(), "project_id");
        assert_eq!(
            DescriptionList::NextSteps.child_table().table(),
            "project_next_steps"
        );
    }

    #[test]
    fn test_tag_links_share_vocabularies() {
        assert_eq!(TagLink::Project.vocabulary(), Vocabulary::Tags);
        assert_eq!(TagLink::Assessment.vocabulary(), Vocabulary::Tags);
        assert_eq!(TagLink::BlogPost.vocabulary(), Vocabulary::BlogTags);
    }
}
