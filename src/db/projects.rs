//! Project persistence: transactional create/update and the read queries.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{
    DescriptionRow, ListResponse, NamedRef, Project, ProjectCard, ProjectDetail, ProjectListItem,
    ProjectMetrics, ProjectOverview, ProjectStatus, ProjectTechnicalDetails, ProjectTechnology,
    ProjectType, SavedEntity, Screenshot, TagLinkView, PROJECT_COLUMNS,
};
use super::writers::{
    self, clean_descriptions, clean_names, ChildTable, DescriptionInput, DescriptionList,
    NameInput, TagLink, Technology, TechnologyInput,
};
use super::{create_slug, like_pattern, resolve_update_slug, split_terms, Page, SlugTable};
use crate::error::ApiError;
use crate::form::EntityForm;
use crate::storage::StoredObject;

// ============================================================================
// Input
// ============================================================================

/// Everything a create or update writes, already parsed from the form.
#[derive(Debug, Clone)]
pub struct ProjectInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub project_type: ProjectType,
    pub live_url: Option<String>,
    pub github_url: Option<String>,
    pub case_study_url: Option<String>,
    pub overview: Option<ProjectOverview>,
    pub metrics: Option<ProjectMetrics>,
    pub technical_details: Option<ProjectTechnicalDetails>,
    pub technologies: Vec<Technology>,
    pub tags: Vec<String>,
    pub lists: Vec<(DescriptionList, Vec<String>)>,
}

/// Files already stored for this write.
#[derive(Debug, Clone, Default)]
pub struct ProjectUploads {
    pub hero_image: Option<StoredObject>,
    pub screenshots: Vec<StoredObject>,
}

fn list_field(list: DescriptionList) -> &'static str {
    match list {
        DescriptionList::Lessons => "lessons",
        DescriptionList::BusinessOutcomes => "businessOutcomes",
        DescriptionList::Improvements => "improvements",
        DescriptionList::NextSteps => "nextSteps",
        DescriptionList::FutureTools => "futureTools",
        DescriptionList::PerformanceMetrics => "performanceMetrics",
    }
}

impl ProjectInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            description: None,
            status: ProjectStatus::InProgress,
            project_type: ProjectType::Personal,
            live_url: None,
            github_url: None,
            case_study_url: None,
            overview: None,
            metrics: None,
            technical_details: None,
            technologies: Vec::new(),
            tags: Vec::new(),
            lists: Vec::new(),
        }
    }

    pub fn from_form(form: &EntityForm) -> Result<Self, ApiError> {
        let status = match form.text("status") {
            None => ProjectStatus::InProgress,
            Some(raw) => ProjectStatus::parse(&raw)
                .ok_or_else(|| ApiError::validation(format!("Invalid status: {raw}")))?,
        };
        let project_type = match form.text("type") {
            None => ProjectType::Personal,
            Some(raw) => ProjectType::parse(&raw)
                .ok_or_else(|| ApiError::validation(format!("Invalid project type: {raw}")))?,
        };

        let technologies: Vec<TechnologyInput> = form.json_or_default("technologies");
        let tags: Vec<NameInput> = form.json_or_default("tags");

        let lists = DescriptionList::ALL
            .iter()
            .map(|list| {
                let items: Vec<DescriptionInput> = form.json_or_default(list_field(*list));
                (*list, clean_descriptions(items))
            })
            .collect();

        Ok(Self {
            title: form.required_text("title", "Title")?,
            subtitle: form.text("subtitle"),
            description: form.text("description"),
            status,
            project_type,
            live_url: form.text("liveUrl"),
            github_url: form.text("githubUrl"),
            case_study_url: form.text("caseStudyUrl"),
            overview: form.json("overview"),
            metrics: form.json("metrics"),
            technical_details: form.json("technicalDetails"),
            technologies: technologies.into_iter().map(Technology::from).collect(),
            tags: clean_names(tags.into_iter().map(NameInput::into_name)),
            lists,
        })
    }
}

/// List filters, combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFilter {
    pub search: Option<String>,
    #[serde(alias = "tags")]
    pub tag: Option<String>,
    #[serde(alias = "technologies")]
    pub technology: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<String>,
}

impl ProjectFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) -> Result<(), ApiError> {
        qb.push(" WHERE 1 = 1");

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.subtitle ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        for tag in split_terms(self.tag.as_deref()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM project_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.project_id = p.id AND lower(t.name) = lower(",
            )
            .push_bind(tag)
            .push("))");
        }

        for tech in split_terms(self.technology.as_deref()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM project_technologies pt \
                 WHERE pt.project_id = p.id AND lower(pt.name) = lower(",
            )
            .push_bind(tech)
            .push("))");
        }

        if let Some(raw) = self.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status = ProjectStatus::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("Invalid status: {raw}")))?;
            qb.push(" AND p.status = ").push_bind(status);
        }

        if let Some(raw) = self.project_type.as_deref().filter(|s| !s.trim().is_empty()) {
            let project_type = ProjectType::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("Invalid project type: {raw}")))?;
            qb.push(" AND p.project_type = ").push_bind(project_type);
        }

        Ok(())
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn write_children(
    conn: &mut sqlx::PgConnection,
    project_id: i32,
    input: &ProjectInput,
    screenshots: &[StoredObject],
) -> Result<(), sqlx::Error> {
    if let Some(overview) = &input.overview {
        sqlx::query(
            "INSERT INTO project_overviews (project_id, problem, solution, impact) VALUES ($1, $2, $3, $4)",
        )
        .bind(project_id)
        .bind(&overview.problem)
        .bind(&overview.solution)
        .bind(&overview.impact)
        .execute(&mut *conn)
        .await?;
    }

    if let Some(metrics) = &input.metrics {
        sqlx::query(
            "INSERT INTO project_metrics (project_id, duration, team_size, role, users) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(project_id)
        .bind(&metrics.duration)
        .bind(metrics.team_size)
        .bind(&metrics.role)
        .bind(&metrics.users)
        .execute(&mut *conn)
        .await?;
    }

    if let Some(details) = &input.technical_details {
        sqlx::query(
            "INSERT INTO project_technical_details (project_id, architecture, deployment, security) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(project_id)
        .bind(&details.architecture)
        .bind(&details.deployment)
        .bind(&details.security)
        .execute(&mut *conn)
        .await?;
    }

    writers::insert_project_technologies(conn, project_id, &input.technologies).await?;
    writers::insert_project_screenshots(conn, project_id, screenshots).await?;
    writers::insert_tag_links(conn, TagLink::Project, project_id, &input.tags).await?;
    for (list, items) in &input.lists {
        writers::insert_descriptions(conn, *list, project_id, items).await?;
    }
    Ok(())
}

pub async fn create(
    pool: &PgPool,
    input: &ProjectInput,
    uploads: &ProjectUploads,
) -> Result<Project, ApiError> {
    let slug = create_slug(&input.title)?;
    let hero_image = uploads.hero_image.as_ref().map(|o| o.url.clone());

    let mut tx = pool.begin().await?;

    let project: Project = sqlx::query_as(&format!(
        r#"
        INSERT INTO projects (slug, title, subtitle, description, status, project_type,
                              hero_image, live_url, github_url, case_study_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(&slug)
    .bind(&input.title)
    .bind(&input.subtitle)
    .bind(&input.description)
    .bind(input.status)
    .bind(input.project_type)
    .bind(&hero_image)
    .bind(&input.live_url)
    .bind(&input.github_url)
    .bind(&input.case_study_url)
    .fetch_one(&mut *tx)
    .await?;

    write_children(&mut tx, project.id, input, &uploads.screenshots).await?;

    tx.commit().await?;

    tracing::info!(id = project.id, slug = %project.slug, "project created");
    Ok(project)
}

/// Full replace by slug. Screenshots are only replaced when new ones were uploaded.
pub async fn update_by_slug(
    pool: &PgPool,
    slug: &str,
    input: &ProjectInput,
    uploads: &ProjectUploads,
) -> Result<SavedEntity<Project>, ApiError> {
    let mut tx = pool.begin().await?;

    let current: Project = sqlx::query_as(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE slug = $1 FOR UPDATE"
    ))
    .bind(slug)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Project"))?;

    let new_slug = resolve_update_slug(
        &mut tx,
        SlugTable::Projects,
        current.id,
        &current.title,
        &current.slug,
        &input.title,
    )
    .await?;

    let hero_image = uploads
        .hero_image
        .as_ref()
        .map(|o| o.url.clone())
        .or(current.hero_image.clone());

    let project: Project = sqlx::query_as(&format!(
        r#"
        UPDATE projects
        SET slug = $2, title = $3, subtitle = $4, description = $5, status = $6,
            project_type = $7, hero_image = $8, live_url = $9, github_url = $10,
            case_study_url = $11, updated_at = now()
        WHERE id = $1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(&new_slug)
    .bind(&input.title)
    .bind(&input.subtitle)
    .bind(&input.description)
    .bind(input.status)
    .bind(input.project_type)
    .bind(&hero_image)
    .bind(&input.live_url)
    .bind(&input.github_url)
    .bind(&input.case_study_url)
    .fetch_one(&mut *tx)
    .await?;

    for child in [
        ChildTable::ProjectOverviews,
        ChildTable::ProjectMetrics,
        ChildTable::ProjectTechnicalDetails,
        ChildTable::ProjectTechnologies,
        ChildTable::ProjectTags,
    ] {
        writers::delete_children(&mut tx, child, project.id).await?;
    }
    for list in DescriptionList::ALL {
        writers::delete_children(&mut tx, list.child_table(), project.id).await?;
    }
    if !uploads.screenshots.is_empty() {
        writers::delete_children(&mut tx, ChildTable::ProjectScreenshots, project.id).await?;
    }

    write_children(&mut tx, project.id, input, &uploads.screenshots).await?;

    tx.commit().await?;

    let changed = (new_slug != current.slug).then_some(new_slug);
    tracing::info!(id = project.id, slug = %project.slug, "project updated");
    Ok(SavedEntity {
        entity: project,
        new_slug: changed,
    })
}

pub async fn delete_by_slug(pool: &PgPool, slug: &str) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM projects WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project"));
    }
    tracing::info!(slug = %slug, "project deleted");
    Ok(())
}

pub async fn delete_by_id(pool: &PgPool, id: i32) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project"));
    }
    tracing::info!(id, "project deleted");
    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

async fn load_detail(pool: &PgPool, project: Project) -> Result<ProjectDetail, ApiError> {
    let id = project.id;

    let overview: Option<ProjectOverview> = sqlx::query_as(
        "SELECT problem, solution, impact FROM project_overviews WHERE project_id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let metrics: Option<ProjectMetrics> = sqlx::query_as(
        "SELECT duration, team_size, role, users FROM project_metrics WHERE project_id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let technical_details: Option<ProjectTechnicalDetails> = sqlx::query_as(
        "SELECT architecture, deployment, security FROM project_technical_details WHERE project_id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let technologies: Vec<ProjectTechnology> = sqlx::query_as(
        "SELECT id, name, category, reason FROM project_technologies WHERE project_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let screenshots: Vec<Screenshot> = sqlx::query_as(
        "SELECT id, url, storage_key, caption, sort_order FROM project_screenshots \
         WHERE project_id = $1 ORDER BY sort_order, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let tags: Vec<NamedRef> = sqlx::query_as(
        "SELECT t.id, t.name, t.slug FROM project_tags pt JOIN tags t ON t.id = pt.tag_id \
         WHERE pt.project_id = $1 ORDER BY t.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let mut lists: Vec<Vec<DescriptionRow>> = Vec::with_capacity(DescriptionList::ALL.len());
    for list in DescriptionList::ALL {
        let rows: Vec<DescriptionRow> = sqlx::query_as(&format!(
            "SELECT id, description FROM {} WHERE project_id = $1 ORDER BY id",
            list.child_table().table()
        ))
        .bind(id)
        .fetch_all(pool)
        .await?;
        lists.push(rows);
    }
    let mut lists = lists.into_iter();
    let mut next = || lists.next().unwrap_or_default();

    Ok(ProjectDetail {
        project,
        overview,
        metrics,
        technical_details,
        technologies,
        screenshots,
        project_tags: tags.into_iter().map(TagLinkView::from).collect(),
        lessons: next(),
        business_outcomes: next(),
        improvements: next(),
        next_steps: next(),
        future_tools: next(),
        performance_metrics: next(),
    })
}

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<ProjectDetail, ApiError> {
    let project: Project =
        sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
    load_detail(pool, project).await
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<ProjectDetail, ApiError> {
    let project: Project =
        sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))?;
    load_detail(pool, project).await
}

pub async fn list(
    pool: &PgPool,
    filter: &ProjectFilter,
    page: Page,
) -> Result<ListResponse<ProjectListItem>, ApiError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
    filter.push_where(&mut count)?;
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {PROJECT_COLUMNS}, \
         ARRAY(SELECT t.name::text FROM project_tags pt JOIN tags t ON t.id = pt.tag_id \
               WHERE pt.project_id = p.id ORDER BY t.name) AS tags, \
         ARRAY(SELECT pt.name::text FROM project_technologies pt \
               WHERE pt.project_id = p.id ORDER BY pt.id) AS technologies \
         FROM projects p"
    ));
    filter.push_where(&mut qb)?;
    qb.push(" ORDER BY p.updated_at DESC, p.id DESC");
    page.push_limit(&mut qb);

    let items: Vec<ProjectListItem> = qb.build_query_as().fetch_all(pool).await?;

    Ok(ListResponse {
        items,
        page: page.page,
        page_size: page.page_size,
        total,
    })
}

pub async fn cards(pool: &PgPool, filter: &ProjectFilter) -> Result<Vec<ProjectCard>, ApiError> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT p.id, p.title, p.slug, p.subtitle, p.hero_image, p.status, p.project_type, \
         (SELECT COUNT(*) FROM project_technologies x WHERE x.project_id = p.id) AS technology_count, \
         (SELECT COUNT(*) FROM project_tags x WHERE x.project_id = p.id) AS tag_count, \
         (SELECT COUNT(*) FROM project_screenshots x WHERE x.project_id = p.id) AS screenshot_count \
         FROM projects p",
    );
    filter.push_where(&mut qb)?;
    qb.push(" ORDER BY p.updated_at DESC, p.id DESC");

    Ok(qb.build_query_as().fetch_all(pool).await?)
}
