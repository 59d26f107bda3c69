//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::storage::StorageGateway;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Option<PgPool>,
    pub storage: StorageGateway,
    pub login_limiter: LoginLimiter,
}

impl AppState {
    pub fn new(config: AppConfig, db: Option<PgPool>, storage: StorageGateway) -> Self {
        let login_limiter = LoginLimiter::new(config.login_rate_limit_secs);
        Self {
            config: Arc::new(config),
            db,
            storage,
            login_limiter,
        }
    }

    /// The pool, or 503 when the server runs without a database.
    pub fn db(&self) -> Result<&PgPool, ApiError> {
        self.db.as_ref().ok_or(ApiError::DatabaseUnavailable)
    }
}

/// One login attempt per client IP per window.
#[derive(Clone, Debug)]
pub struct LoginLimiter {
    window_secs: i64,
    last_attempt: Arc<RwLock<HashMap<String, i64>>>,
}

impl LoginLimiter {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            last_attempt: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record an attempt; `false` when the client is still inside its window.
    pub async fn check(&self, ip: &str) -> bool {
        if self.window_secs <= 0 {
            return true;
        }

        let now = Utc::now().timestamp();
        let mut attempts = self.last_attempt.write().await;

        // Drop expired entries so the map only holds active clients.
        attempts.retain(|_, last| now - *last < self.window_secs);

        if attempts.contains_key(ip) {
            return false;
        }

        attempts.insert(ip.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_blocks_second_attempt_in_window() {
        let limiter = LoginLimiter::new(60);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_limiter_disabled_with_zero_window() {
        let limiter = LoginLimiter::new(0);
        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
    }

    #[test]
    fn test_db_unavailable_without_pool() {
        let state = AppState::new(
            AppConfig::for_tests("secret"),
            None,
            StorageGateway::in_memory("https://cdn.example"),
        );
        assert!(matches!(state.db(), Err(ApiError::DatabaseUnavailable)));
    }
}
