//! Router-level access checks. None of these need a database.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use serde_json::json;

fn browser_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn preflight_from_trusted_origin_gets_cors_headers() {
    let (app, _) = app_without_db();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/projects")
        .header(header::ORIGIN, TRUSTED_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let res = tower::ServiceExt::oneshot(app, req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TRUSTED_ORIGIN
    );
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn preflight_from_unknown_origin_has_no_cors_headers() {
    let (app, _) = app_without_db();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/blog/slug/anything")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let res = tower::ServiceExt::oneshot(app, req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(!res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn health_is_open_to_browsers() {
    let (app, _) = app_without_db();
    let (status, body) = send(&app, browser_get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn server_caller_reaches_public_reads() {
    let (app, _) = app_without_db();

    // No user agent at all.
    let (status, body) = send(&app, get("/api/projects")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Database not available");

    let req = Request::get("/api/assessments/cards")
        .header(header::USER_AGENT, "curl/8.4.0")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn browser_without_trusted_origin_is_rejected() {
    let (app, _) = app_without_db();
    let (status, body) = send(&app, browser_get("/api/projects")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn browser_from_trusted_front_end_reaches_public_reads() {
    let (app, _) = app_without_db();

    let req = Request::get("/api/blog/cards")
        .header(header::USER_AGENT, BROWSER_UA)
        .header(header::ORIGIN, TRUSTED_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let res = tower::ServiceExt::oneshot(app.clone(), req).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TRUSTED_ORIGIN
    );

    let req = Request::get("/api/projects/slug/demo-app")
        .header(header::USER_AGENT, BROWSER_UA)
        .header(header::REFERER, "https://portfolio.example/projects/demo-app")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn equivalent_referer_spellings_reach_public_reads() {
    let (app, _) = app_without_db();

    for referer in [
        "https://portfolio.example:443/blog",
        "HTTPS://Portfolio.Example/blog",
    ] {
        let req = Request::get("/api/blog/cards")
            .header(header::USER_AGENT, BROWSER_UA)
            .header(header::REFERER, referer)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{referer}");
    }

    let req = Request::get("/api/blog/cards")
        .header(header::USER_AGENT, BROWSER_UA)
        .header(header::REFERER, "https://portfolio.example.evil.test/blog")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn writes_need_a_session_even_from_server_callers() {
    let (app, _) = app_without_db();
    let req = Request::post("/api/projects").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::delete("/api/blog/1").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_redirects_to_login() {
    let (app, _) = app_without_db();
    let res = tower::ServiceExt::oneshot(app, browser_get("/dashboard/stats"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        res.headers()[header::LOCATION],
        "/login?callbackUrl=%2Fdashboard%2Fstats"
    );
}

#[tokio::test]
async fn session_from_login_opens_the_dashboard() {
    let (app, _) = app_without_db();
    let req = Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "admin@example.com", "password": ADMIN_PASSWORD }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    // Past the gate; the handler then needs the database.
    let (status, _) = send(&app, authed("GET", "/dashboard/stats", &token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, authed("GET", "/dashboard/stats", "not-a-token")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, _) = app_without_db();
    let res = tower::ServiceExt::oneshot(app, get("/api/health"))
        .await
        .unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn standalone_upload_reports_each_file() {
    let (app, state) = app_without_db();
    let token = admin_token(&state);

    let req = MultipartBody::new()
        .file("files", "diagram.png", "image/png", PNG_BYTES)
        .file("files", "page.html", "text/html", b"<html></html>")
        .into_request("POST", "/api/uploads?folder=projects", &token);
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["uploaded"], 1);
    assert_eq!(body["failed"], 1);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);

    let key = results[0]["file"]["key"].as_str().unwrap();
    assert!(key.starts_with("projects/"));
    assert!(state.storage.exists(key).await);
}

#[tokio::test]
async fn upload_to_unknown_folder_is_rejected() {
    let (app, state) = app_without_db();
    let token = admin_token(&state);
    let req = MultipartBody::new()
        .file("files", "a.png", "image/png", PNG_BYTES)
        .into_request("POST", "/api/uploads?folder=secrets", &token);
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
