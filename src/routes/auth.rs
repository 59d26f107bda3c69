/**
 * Authentication Routes
 * Admin login against the configured credentials, session verify and logout
 */
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::session;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User info returned to the admin UI
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn failure(status: StatusCode, error: &str) -> Response {
        (
            status,
            Json(LoginResponse {
                success: false,
                user: None,
                token: None,
                error: Some(error.to_string()),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let ip = addr.ip().to_string();

    if !state.login_limiter.check(&ip).await {
        tracing::warn!(ip = %ip, "login rate limited");
        return LoginResponse::failure(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        );
    }

    let email = payload.email.trim().to_string();
    if email.is_empty() || payload.password.is_empty() {
        return LoginResponse::failure(StatusCode::BAD_REQUEST, "Email and password are required");
    }
    if !email.contains('@') {
        return LoginResponse::failure(StatusCode::BAD_REQUEST, "Invalid email format");
    }

    let admin = state.config.admin.clone();
    if !email.eq_ignore_ascii_case(&admin.email) {
        tracing::warn!("Failed login attempt for unknown email: {}", email);
        return LoginResponse::failure(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    // bcrypt is CPU-bound; keep it off the async workers.
    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || {
        bcrypt::verify(&password, &admin.password_hash).unwrap_or(false)
    })
    .await
    .unwrap_or(false);

    if !verified {
        tracing::warn!("Failed login attempt for: {}", email);
        return LoginResponse::failure(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    let token = match session::issue_token(&state.config.session, &state.config.admin.email) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create session token: {}", e);
            return LoginResponse::failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session",
            );
        }
    };

    tracing::info!("Successful login for: {}", email);

    let cookie = session::session_cookie(
        &token,
        &state.config.session,
        state.config.is_production(),
    );
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            user: Some(UserInfo {
                email: state.config.admin.email.clone(),
                role: "admin".to_string(),
            }),
            token: Some(token),
            error: None,
        }),
    )
        .into_response()
}

/// POST /api/auth/verify
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Json<VerifyResponse> {
    let Some(token) = session::token_from_headers(&headers) else {
        return Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some("No session token provided".to_string()),
        });
    };

    match session::verify_token(&state.config.session, &token) {
        Ok(claims) => Json(VerifyResponse {
            success: true,
            is_valid: true,
            user: Some(UserInfo {
                email: claims.email,
                role: claims.role,
            }),
            error: None,
        }),
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            Json(VerifyResponse {
                success: false,
                is_valid: false,
                user: None,
                error: Some("Invalid or expired token".to_string()),
            })
        }
    }
}

/// POST /api/auth/logout
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session::clear_session_cookie())],
        Json(LogoutResponse { success: true }),
    )
}
