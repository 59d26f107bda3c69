//! Portfolio CMS - library for app logic and testing

pub mod access;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod form;
pub mod logging;
pub mod routes;
pub mod session;
pub mod slug;
pub mod state;
pub mod storage;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::{AppConfig, DEFAULT_ADMIN_EMAIL, DEFAULT_SESSION_SECRET};
use crate::state::AppState;
use crate::storage::StorageGateway;

/// Request body ceiling. Multipart create/update can carry several 10 MiB images.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

fn api_routes() -> Router<AppState> {
    use routes::{assessments, blog, projects};

    Router::new()
        // Projects
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/api/projects/cards", get(projects::project_cards))
        .route(
            "/api/projects/slug/{slug}",
            get(projects::get_project_by_slug)
                .put(projects::update_project)
                .delete(projects::delete_project_by_slug),
        )
        .route(
            "/api/projects/{id}",
            get(projects::get_project_by_id).delete(projects::delete_project_by_id),
        )
        // Blog
        .route("/api/blog", get(blog::list_posts).post(blog::create_post))
        .route("/api/blog/cards", get(blog::post_cards))
        .route("/api/blog/rss.xml", get(routes::rss::rss_feed))
        .route(
            "/api/blog/slug/{slug}",
            get(blog::get_post_by_slug)
                .put(blog::update_post)
                .delete(blog::delete_post_by_slug),
        )
        .route(
            "/api/blog/{id}",
            get(blog::get_post_by_id).delete(blog::delete_post_by_id),
        )
        // Assessments
        .route(
            "/api/assessments",
            get(assessments::list_assessments).post(assessments::create_assessment),
        )
        .route("/api/assessments/cards", get(assessments::assessment_cards))
        .route(
            "/api/assessments/slug/{slug}",
            get(assessments::get_assessment_by_slug)
                .put(assessments::update_assessment)
                .delete(assessments::delete_assessment_by_slug),
        )
        .route(
            "/api/assessments/{id}",
            get(assessments::get_assessment_by_id).delete(assessments::delete_assessment_by_id),
        )
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/health/detailed", get(routes::health::health_detailed))
        .route("/api/health/ready", get(routes::health::health_ready))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify))
        .route("/api/auth/logout", post(routes::auth::logout))
        .merge(api_routes())
        .route(
            "/api/uploads",
            post(routes::uploads::upload_files).delete(routes::uploads::delete_upload),
        )
        .route("/dashboard/stats", get(routes::dashboard::dashboard_stats))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), access::gate))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

/// Refuse insecure production settings; warn about weaker ones.
fn check_production_config(config: &AppConfig) -> anyhow::Result<()> {
    if !config.is_production() {
        return Ok(());
    }

    if config.session.secret.is_empty() || config.session.secret == DEFAULT_SESSION_SECRET {
        anyhow::bail!(
            "SESSION_SECRET must be set to a secure, unique value in production. \
             Refusing to start with the default secret."
        );
    }

    if config.admin.email == DEFAULT_ADMIN_EMAIL {
        tracing::warn!("SECURITY: ADMIN_EMAIL is using an insecure default.");
    }
    if std::env::var("ADMIN_HASH_PASSWORD").is_err() && std::env::var("ADMIN_PASSWORD").is_err() {
        tracing::warn!(
            "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
             The fallback password 'admin123' is insecure."
        );
    }
    Ok(())
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init(config.is_production());

    routes::health::init_start_time();
    check_production_config(&config)?;

    let db = if config.db.url.is_some() {
        match db::init_pool(&config.db).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
                None
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
        None
    };

    let storage =
        StorageGateway::from_config(&config.storage).context("Failed to configure object storage")?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT configuration")?;

    let app = create_app(AppState::new(config, db, storage));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_session_secret() {
        let mut config = AppConfig::for_tests("admin123");
        config.environment = "production".to_string();
        config.session.secret = DEFAULT_SESSION_SECRET.to_string();
        assert!(check_production_config(&config).is_err());

        config.session.secret = "a-real-secret".to_string();
        assert!(check_production_config(&config).is_ok());
    }

    #[test]
    fn test_development_skips_production_checks() {
        let mut config = AppConfig::for_tests("admin123");
        config.session.secret = DEFAULT_SESSION_SECRET.to_string();
        assert!(check_production_config(&config).is_ok());
    }
}
