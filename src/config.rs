//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. A missing or malformed value is a
//! `ConfigError` and the server refuses to start.

use std::env;
use std::time::Duration;

use chrono_tz::Tz;

/// Default TikTok consent screen.
pub const DEFAULT_AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
/// Default TikTok token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
/// Default TikTok Display API base.
pub const DEFAULT_API_BASE_URL: &str = "https://open.tiktokapis.com/v2";

/// Minimum length of `TOKEN_ENCRYPTION_KEY`.
pub const MIN_ENCRYPTION_KEY_LEN: usize = 32;

/// Which key-value cache backs the pending-authorization store and video cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis { url: String },
}

/// Which credential repository to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- TikTok application ---
    /// TikTok client key (public)
    pub tiktok_client_key: String,
    /// TikTok client secret
    pub tiktok_client_secret: String,
    /// Redirect URI registered with TikTok
    pub tiktok_redirect_uri: String,
    /// Requested scopes, in configuration order
    pub tiktok_scopes: Vec<String>,
    pub tiktok_auth_url: String,
    pub tiktok_token_url: String,
    pub tiktok_api_base_url: String,
    /// Connect timeout for TikTok HTTP calls
    pub http_connect_timeout: Duration,
    /// Total timeout for TikTok HTTP calls
    pub http_timeout: Duration,

    // --- Service ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub cache_backend: CacheBackend,
    pub database_backend: DatabaseBackend,
    /// Timezone for hour-of-day and week bucketing
    pub analytics_timezone: Tz,
    /// Upper bound on videos fetched by one sync
    pub sync_max_videos: usize,

    // --- Secrets ---
    /// Secret the credential vault derives its key from
    pub token_encryption_key: String,
    /// JWT verification key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            tiktok_client_key: "test_client_key".to_string(),
            tiktok_client_secret: "test_client_secret".to_string(),
            tiktok_redirect_uri: "http://localhost:8080/auth/tiktok/callback".to_string(),
            tiktok_scopes: vec!["user.info.basic".to_string(), "video.list".to_string()],
            tiktok_auth_url: DEFAULT_AUTH_URL.to_string(),
            tiktok_token_url: DEFAULT_TOKEN_URL.to_string(),
            tiktok_api_base_url: DEFAULT_API_BASE_URL.to_string(),
            http_connect_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            cache_backend: CacheBackend::Memory,
            database_backend: DatabaseBackend::Memory,
            analytics_timezone: Tz::UTC,
            sync_max_videos: 100,
            token_encryption_key: "test_encryption_key_32_bytes_min!".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let token_encryption_key = required("TOKEN_ENCRYPTION_KEY")?;
        if token_encryption_key.len() < MIN_ENCRYPTION_KEY_LEN {
            return Err(ConfigError::Invalid(
                "TOKEN_ENCRYPTION_KEY",
                format!("must be at least {} characters", MIN_ENCRYPTION_KEY_LEN),
            ));
        }

        let tiktok_scopes = parse_scopes(
            &env::var("TIKTOK_SCOPES").unwrap_or_else(|_| "user.info.basic,video.list".to_string()),
        );
        if tiktok_scopes.is_empty() {
            return Err(ConfigError::Invalid(
                "TIKTOK_SCOPES",
                "at least one scope is required".to_string(),
            ));
        }

        let cache_backend = match optional("CACHE_BACKEND", "memory").as_str() {
            "memory" => CacheBackend::Memory,
            "redis" => CacheBackend::Redis {
                url: required("REDIS_URL")?,
            },
            other => {
                return Err(ConfigError::Invalid(
                    "CACHE_BACKEND",
                    format!("unknown backend '{}'", other),
                ))
            }
        };

        let database_backend = match optional("DATABASE_BACKEND", "firestore").as_str() {
            "firestore" => DatabaseBackend::Firestore,
            "memory" => DatabaseBackend::Memory,
            other => {
                return Err(ConfigError::Invalid(
                    "DATABASE_BACKEND",
                    format!("unknown backend '{}'", other),
                ))
            }
        };

        let analytics_timezone: Tz = optional("ANALYTICS_TIMEZONE", "UTC")
            .parse()
            .map_err(|e| ConfigError::Invalid("ANALYTICS_TIMEZONE", format!("{}", e)))?;

        Ok(Self {
            tiktok_client_key: required("TIKTOK_CLIENT_KEY")?,
            tiktok_client_secret: required("TIKTOK_CLIENT_SECRET")?,
            tiktok_redirect_uri: required("TIKTOK_REDIRECT_URI")?,
            tiktok_scopes,
            tiktok_auth_url: optional("TIKTOK_AUTH_URL", DEFAULT_AUTH_URL),
            tiktok_token_url: optional("TIKTOK_TOKEN_URL", DEFAULT_TOKEN_URL),
            tiktok_api_base_url: optional("TIKTOK_API_BASE_URL", DEFAULT_API_BASE_URL),
            http_connect_timeout: Duration::from_secs(parsed(
                "TIKTOK_HTTP_CONNECT_TIMEOUT_SECS",
                10,
            )?),
            http_timeout: Duration::from_secs(parsed("TIKTOK_HTTP_TIMEOUT_SECS", 30)?),
            frontend_url: optional("FRONTEND_URL", "http://localhost:5173"),
            gcp_project_id: optional("GCP_PROJECT_ID", "local-dev"),
            port: parsed("PORT", 8080)?,
            cache_backend,
            database_backend,
            analytics_timezone,
            sync_max_videos: parsed("SYNC_MAX_VIDEOS", 100)?,
            token_encryption_key,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse '{}'", raw))),
        _ => Ok(default),
    }
}

/// Split a scope list on commas and/or whitespace.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes_accepts_commas_and_spaces() {
        assert_eq!(
            parse_scopes("user.info.basic, video.list  user.info.stats"),
            vec!["user.info.basic", "video.list", "user.info.stats"]
        );
        assert!(parse_scopes(" , ").is_empty());
    }

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("TIKTOK_CLIENT_KEY", "test_key");
        env::set_var("TIKTOK_CLIENT_SECRET", "test_secret");
        env::set_var("TIKTOK_REDIRECT_URI", "http://localhost/cb");
        env::set_var("TOKEN_ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("ANALYTICS_TIMEZONE", "America/Los_Angeles");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.tiktok_client_key, "test_key");
        assert_eq!(config.tiktok_client_secret, "test_secret");
        assert_eq!(config.analytics_timezone, chrono_tz::America::Los_Angeles);
        assert_eq!(config.tiktok_scopes.len(), 2);
    }
}
