//! Request-level access gate and CORS.
//!
//! Public GET routes are open to the trusted front-end origins and to
//! server-to-server callers; everything else needs an admin session.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use url::{form_urlencoded, Url};

use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Health checks and the auth endpoints.
    Open,
    /// Content reads: trusted origin, server caller or session.
    PublicRead,
    /// Writes and anything unlisted under `/api`.
    Session,
    /// Admin pages; unauthenticated users are redirected to the login page.
    Dashboard,
}

const PUBLIC_PREFIXES: &[&str] = &["/api/projects", "/api/blog", "/api/assessments"];

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(method: &Method, path: &str) -> Access {
    if under(path, "/api/health") || under(path, "/api/auth") {
        return Access::Open;
    }
    if under(path, "/dashboard") {
        return Access::Dashboard;
    }
    let is_read = method == Method::GET || method == Method::HEAD;
    if is_read && PUBLIC_PREFIXES.iter().any(|prefix| under(path, prefix)) {
        return Access::PublicRead;
    }
    Access::Session
}

/// ASCII serialization of a URL's origin: lowercase host, default port dropped.
/// `None` for anything without a `scheme://host` origin.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let origin = Url::parse(raw.trim()).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The request's `Origin` if it is on the allow-list. `allowed` holds normalized origins.
pub fn allowed_origin<'a>(headers: &'a HeaderMap, allowed: &[String]) -> Option<&'a str> {
    header_str(headers, header::ORIGIN).filter(|raw| is_listed(raw, allowed))
}

fn is_listed(url: &str, allowed: &[String]) -> bool {
    normalize_origin(url).is_some_and(|origin| allowed.iter().any(|a| *a == origin))
}

/// Origin or referer matches a trusted front-end origin.
pub fn is_trusted_origin(headers: &HeaderMap, allowed: &[String]) -> bool {
    allowed_origin(headers, allowed).is_some()
        || header_str(headers, header::REFERER).is_some_and(|referer| is_listed(referer, allowed))
}

/// No user agent, or one that is not a browser.
pub fn is_server_to_server(headers: &HeaderMap) -> bool {
    match header_str(headers, header::USER_AGENT) {
        None => true,
        Some(ua) => !ua.trim_start().starts_with("Mozilla/"),
    }
}

fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn apply_cors(headers: &mut HeaderMap, origin: &str, preflight: bool) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    if preflight {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type, authorization, x-request-id"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
    }
}

fn decide(state: &AppState, method: &Method, path: &str, headers: &HeaderMap) -> Option<Response> {
    let access = classify(method, path);
    if access == Access::Open {
        return None;
    }

    let config = &state.config;
    if access == Access::PublicRead
        && (is_trusted_origin(headers, &config.allowed_origins) || is_server_to_server(headers))
    {
        return None;
    }

    if session::session_from_headers(&config.session, headers).is_some() {
        return None;
    }

    match access {
        Access::Dashboard => {
            tracing::info!(path = %path, "redirecting unauthenticated dashboard request");
            let target = format!("/login?callbackUrl={}", encode_component(path));
            Some(Redirect::to(&target).into_response())
        }
        _ => {
            tracing::warn!(method = %method, path = %path, "rejected request without session");
            Some(ApiError::Unauthorized("Authentication required".to_string()).into_response())
        }
    }
}

/// Gate middleware. Installed with `from_fn_with_state`.
pub async fn gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = allowed_origin(request.headers(), &state.config.allowed_origins)
        .map(str::to_string);

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = &origin {
            apply_cors(response.headers_mut(), origin, true);
        }
        return response;
    }

    let mut response = match decide(
        &state,
        request.method(),
        request.uri().path(),
        request.headers(),
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    };

    if let Some(origin) = &origin {
        apply_cors(response.headers_mut(), origin, false);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_routes() {
        assert_eq!(classify(&Method::GET, "/api/health"), Access::Open);
        assert_eq!(classify(&Method::GET, "/api/health/ready"), Access::Open);
        assert_eq!(classify(&Method::POST, "/api/auth/login"), Access::Open);
        assert_eq!(classify(&Method::GET, "/api/projects/cards"), Access::PublicRead);
        assert_eq!(classify(&Method::GET, "/api/blog/rss.xml"), Access::PublicRead);
        assert_eq!(classify(&Method::POST, "/api/projects"), Access::Session);
        assert_eq!(classify(&Method::DELETE, "/api/blog/slug/x"), Access::Session);
        assert_eq!(classify(&Method::GET, "/api/uploads"), Access::Session);
        assert_eq!(classify(&Method::GET, "/api/projectsx"), Access::Session);
        assert_eq!(classify(&Method::GET, "/dashboard/stats"), Access::Dashboard);
    }

    #[test]
    fn test_referer_origin_is_trusted() {
        let allowed = vec!["https://portfolio.example".to_string()];
        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://portfolio.example/projects/demo?x=1"),
        );
        assert!(is_trusted_origin(&headers, &allowed));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://portfolio.example.evil.dev/"),
        );
        assert!(!is_trusted_origin(&headers, &allowed));
    }

    #[test]
    fn test_server_to_server_heuristic() {
        let mut headers = HeaderMap::new();
        assert!(is_server_to_server(&headers));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.4.0"));
        assert!(is_server_to_server(&headers));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64)"),
        );
        assert!(!is_server_to_server(&headers));
    }

    #[test]
    fn test_normalize_origin() {
        assert_eq!(
            normalize_origin("http://localhost:3000/a/b").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(
            normalize_origin("HTTPS://Portfolio.Example:443/blog").as_deref(),
            Some("https://portfolio.example")
        );
        assert_eq!(normalize_origin("not a url"), None);
        assert_eq!(normalize_origin("null"), None);
    }

    #[test]
    fn test_equivalent_referer_spellings_are_trusted() {
        let allowed = vec!["https://portfolio.example".to_string()];
        for referer in [
            "https://portfolio.example:443/blog",
            "HTTPS://Portfolio.Example/blog",
        ] {
            let mut headers = HeaderMap::new();
            headers.insert(header::REFERER, HeaderValue::from_static(referer));
            assert!(is_trusted_origin(&headers, &allowed), "{referer}");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://portfolio.example:8443/blog"),
        );
        assert!(!is_trusted_origin(&headers, &allowed));
    }

    #[test]
    fn test_origin_header_matches_after_normalizing() {
        let allowed = vec!["https://portfolio.example".to_string()];
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://PORTFOLIO.example:443"),
        );
        assert_eq!(
            allowed_origin(&headers, &allowed),
            Some("https://PORTFOLIO.example:443")
        );
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("/dashboard/stats"), "%2Fdashboard%2Fstats");
        assert_eq!(encode_component("/dashboard/a b&c"), "%2Fdashboard%2Fa+b%26c");
    }
}
