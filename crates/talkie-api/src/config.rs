//! API configuration.

use std::path::PathBuf;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Where uploaded inputs are written
    pub upload_dir: PathBuf,
    /// Where the inference tool writes finished videos
    pub result_dir: PathBuf,
    /// SQLite database URL
    pub database_url: String,
    /// RSA private key used to decrypt tickets
    pub private_key_path: PathBuf,
    /// Ticket lifetime
    pub token_valid_minutes: u64,
    /// Whether ticket age is checked at all
    pub token_expire_enabled: bool,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 50 * 1024 * 1024, // 50MB
            environment: "development".to_string(),
            upload_dir: PathBuf::from("uploads"),
            result_dir: PathBuf::from("results"),
            database_url: "sqlite://tasks.db".to_string(),
            private_key_path: PathBuf::from("certs/private.pem"),
            token_valid_minutes: 5,
            token_expire_enabled: true,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            result_dir: std::env::var("RESULT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.result_dir),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            private_key_path: std::env::var("PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.private_key_path),
            token_valid_minutes: env_parse("TOKEN_VALID_MINUTES")
                .unwrap_or(defaults.token_valid_minutes),
            token_expire_enabled: env_bool("TOKEN_EXPIRE_ENABLED")
                .unwrap_or(defaults.token_expire_enabled),
            metrics_enabled: env_bool("METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.environment)
    }

    /// Ticket lifetime in seconds.
    pub fn token_ttl_secs(&self) -> i64 {
        i64::try_from(self.token_valid_minutes.saturating_mul(60)).unwrap_or(i64::MAX)
    }
}

/// Case-insensitive match on the `ENVIRONMENT` value.
pub fn is_production_environment(environment: &str) -> bool {
    environment.trim().eq_ignore_ascii_case("production")
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| parse_bool(&v))
}

/// Accepts the usual spellings of a boolean flag.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
