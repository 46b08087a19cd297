use crate::utils::duration::parse_duration;
use chrono::Duration;
use std::env;
use std::path::PathBuf;

/// Runtime configuration for the CV gate service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string (default: "sqlite://cv-gate.db?mode=rwc")
    pub database_url: String,

    /// Maximum pooled SQLite connections (default: 4)
    pub db_max_connections: u32,

    /// Directory served publicly under `/static` (default: "static")
    pub static_dir: PathBuf,

    /// HTML template for the CV page (default: "templates/cv.html")
    pub template_path: PathBuf,

    /// CV data file name, relative to `static_dir` (default: "cvdata.json")
    pub data_file: String,

    /// Lifetime of a token created without an explicit expiry (default: 60 days)
    pub default_token_ttl: Duration,

    /// How many fresh ids to draw before giving up on a token insert (default: 8)
    pub token_id_attempts: u32,

    /// Take the client ip from `X-Forwarded-For` when present (default: false)
    pub trust_forwarded_for: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://cv-gate.db?mode=rwc".to_string(),
            db_max_connections: 4,
            static_dir: PathBuf::from("static"),
            template_path: PathBuf::from("templates/cv.html"),
            data_file: "cvdata.json".to_string(),
            default_token_ttl: Duration::days(60),
            token_id_attempts: 8,
            trust_forwarded_for: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default.db_max_connections),

            static_dir: env::var("CV_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.static_dir),

            template_path: env::var("CV_TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.template_path),

            data_file: env::var("CV_DATA_FILE").unwrap_or(default.data_file),

            default_token_ttl: env::var("DEFAULT_TOKEN_EXPIRY")
                .ok()
                .and_then(|v| match parse_duration(&v) {
                    Ok(ttl) => Some(ttl),
                    Err(e) => {
                        tracing::warn!("Ignoring DEFAULT_TOKEN_EXPIRY={:?}: {}", v, e);
                        None
                    }
                })
                .unwrap_or(default.default_token_ttl),

            token_id_attempts: env::var("TOKEN_ID_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default.token_id_attempts),

            trust_forwarded_for: env::var("TRUST_FORWARDED_FOR")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.trust_forwarded_for),
        }
    }

    /// Config backed by a private in-memory database, for tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            ..Self::default()
        }
    }

    /// Path of the JSON file holding the CV title and repository link
    pub fn data_path(&self) -> PathBuf {
        self.static_dir.join(&self.data_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_token_ttl, Duration::days(60));
        assert_eq!(config.token_id_attempts, 8);
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.data_path(), PathBuf::from("static/cvdata.json"));
    }

    #[test]
    fn test_in_memory_config() {
        let config = AppConfig::in_memory();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.db_max_connections, 1);
    }
}
