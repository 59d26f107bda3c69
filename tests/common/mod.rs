//! Shared helpers for router-level tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use portfolio_cms::{
    config::AppConfig, create_app, db, session, state::AppState, storage::StorageGateway,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "admin123";
pub const TRUSTED_ORIGIN: &str = "https://portfolio.example";
pub const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

/// Smallest byte string that passes the PNG signature check.
pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

lazy_static::lazy_static! {
    static ref MIGRATED: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::new();
}

fn with_connect_info(app: Router) -> Router {
    app.layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

/// App without a database: storage in memory, data routes answer 503.
pub fn app_without_db() -> (Router, AppState) {
    let config = AppConfig::for_tests(ADMIN_PASSWORD);
    let storage = StorageGateway::in_memory("https://cdn.example");
    let state = AppState::new(config, None, storage);
    (with_connect_info(create_app(state.clone())), state)
}

/// App backed by `TEST_DATABASE_URL`, or `None` when it is unset.
pub async fn app_with_db() -> Option<(Router, AppState)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");

    MIGRATED
        .get_or_init(|| async {
            db::run_migrations(&pool).await.expect("run migrations");
        })
        .await;

    let config = AppConfig::for_tests(ADMIN_PASSWORD);
    let storage = StorageGateway::in_memory("https://cdn.example");
    let state = AppState::new(config, Some(pool), storage);
    Some((with_connect_info(create_app(state.clone())), state))
}

pub fn admin_token(state: &AppState) -> String {
    session::issue_token(&state.config.session, &state.config.admin.email).expect("issue token")
}

/// Short random suffix so parallel tests never share slugs or tag names.
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{} {}", prefix, &id[..10])
}

/// Builder for `multipart/form-data` request bodies.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "portfolio-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn json(self, name: &str, value: &Value) -> Self {
        let raw = value.to_string();
        self.text(name, &raw)
    }

    pub fn file(mut self, name: &str, filename: &str, mime: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, mime
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: &str, uri: &str, token: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(self.body))
            .expect("build multipart request")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("build request")
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("build request")
}

/// Send one request; the body is parsed as JSON when possible.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router call");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
