//! Application configuration, read from the process environment (and `.env`).

use bcrypt::{hash, DEFAULT_COST};

use crate::access::normalize_origin;
use crate::db::DbConfig;

/// Secret used when `SESSION_SECRET` is missing. Refused in production.
pub const DEFAULT_SESSION_SECRET: &str = "default-session-secret-change-in-production";

/// Fallback admin address for local development.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub db: DbConfig,
    pub admin: AdminCredentials,
    pub session: SessionConfig,
    pub allowed_origins: Vec<String>,
    pub storage: StorageConfig,
    /// Minimum seconds between two login attempts from one IP. Zero disables the check.
    pub login_rate_limit_secs: i64,
    pub site: SiteConfig,
}

/// Public site details used in the RSS feed.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    /// bcrypt hash of the admin password
    pub password_hash: String,
}

/// Longest session lifetime accepted: one year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

impl SessionConfig {
    /// Session lifetime, clamped to 1 hour ..= [`MAX_SESSION_TTL_HOURS`].
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
}

impl StorageConfig {
    /// Base URL under which stored keys are publicly reachable.
    pub fn public_base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.bucket {
            Some(bucket) => format!("https://{}.s3.{}.amazonaws.com", bucket, self.region),
            None => "/uploads".to_string(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Parse a comma-separated origin list into normalized origins. Blanks are
/// dropped; entries that are not `scheme://host` URLs are logged and dropped.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let origin = normalize_origin(entry);
            if origin.is_none() {
                tracing::warn!(entry, "ignoring invalid allowed origin");
            }
            origin
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let password_hash = if let Some(hashed) = env_opt("ADMIN_HASH_PASSWORD") {
            hashed
        } else if let Some(plain) = env_opt("ADMIN_PASSWORD") {
            hash(plain, DEFAULT_COST).unwrap_or_default()
        } else {
            // Development default: "admin123"
            hash("admin123", DEFAULT_COST).unwrap_or_default()
        };

        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .map(|s| parse_origins(&s))
            .filter(|origins| !origins.is_empty())
            .or_else(|| env_opt("FRONTEND_ORIGIN").map(|s| parse_origins(&s)))
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            environment: env_opt("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            host: env_opt("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse("PORT", 3001),
            db: DbConfig::default(),
            admin: AdminCredentials {
                email: env_opt("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
                password_hash,
            },
            session: SessionConfig {
                secret: env_opt("SESSION_SECRET")
                    .or_else(|| env_opt("JWT_SECRET"))
                    .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
                ttl_hours: env_parse("SESSION_TTL_HOURS", 24_i64).clamp(1, MAX_SESSION_TTL_HOURS),
            },
            allowed_origins,
            storage: StorageConfig {
                bucket: env_opt("S3_BUCKET_NAME"),
                region: env_opt("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key_id: env_opt("S3_ACCESS_KEY_ID"),
                secret_access_key: env_opt("S3_SECRET_ACCESS_KEY"),
                endpoint: env_opt("S3_ENDPOINT"),
                public_url: env_opt("S3_PUBLIC_URL"),
            },
            login_rate_limit_secs: env_parse("LOGIN_RATE_LIMIT_SECS", 5),
            site: SiteConfig {
                url: env_opt("SITE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                title: env_opt("SITE_TITLE").unwrap_or_else(|| "Portfolio Blog".to_string()),
                description: env_opt("SITE_DESCRIPTION")
                    .unwrap_or_else(|| "Latest articles and insights".to_string()),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration for tests: fixed secret, known admin, no rate limit, in-memory storage.
    pub fn for_tests(admin_password: &str) -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            db: DbConfig::default(),
            admin: AdminCredentials {
                email: DEFAULT_ADMIN_EMAIL.to_string(),
                password_hash: hash(admin_password, 4).unwrap_or_default(),
            },
            session: SessionConfig {
                secret: "test-session-secret".to_string(),
                ttl_hours: 1,
            },
            allowed_origins: vec!["https://portfolio.example".to_string()],
            storage: StorageConfig {
                public_url: Some("https://cdn.example".to_string()),
                ..StorageConfig::default()
            },
            login_rate_limit_secs: 0,
            site: SiteConfig {
                url: "https://portfolio.example".to_string(),
                title: "Portfolio Blog".to_string(),
                description: "Test feed".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_trims_and_drops_blanks() {
        let origins = parse_origins(" https://a.dev/ , ,http://localhost:3000");
        assert_eq!(origins, vec!["https://a.dev", "http://localhost:3000"]);
    }

    #[test]
    fn test_session_ttl_is_clamped() {
        let session = SessionConfig {
            secret: "s".to_string(),
            ttl_hours: i64::MAX,
        };
        assert_eq!(session.ttl().num_hours(), MAX_SESSION_TTL_HOURS);

        let session = SessionConfig {
            secret: "s".to_string(),
            ttl_hours: -5,
        };
        assert_eq!(session.ttl().num_hours(), 1);
    }

    #[test]
    fn test_parse_origins_normalizes_case_and_default_port() {
        let origins = parse_origins("HTTPS://Portfolio.Example:443/,localhost:3000,*");
        assert_eq!(origins, vec!["https://portfolio.example"]);
    }

    #[test]
    fn test_public_base_url_prefers_explicit_url() {
        let config = StorageConfig {
            bucket: Some("media".to_string()),
            region: "eu-west-1".to_string(),
            public_url: Some("https://cdn.example/".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(config.public_base_url(), "https://cdn.example");
    }

    #[test]
    fn test_public_base_url_from_bucket_and_region() {
        let config = StorageConfig {
            bucket: Some("media".to_string()),
            region: "eu-west-1".to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(
            config.public_base_url(),
            "https://media.s3.eu-west-1.amazonaws.com"
        );
    }
}
