//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `MERCADO_API_BASE_URL` - Commerce API base URL (default: `http://localhost:5000/api`)
//! - `MERCADO_API_TIMEOUT_SECS` - Per-request timeout in seconds (default: 10)
//! - `MERCADO_SESSION_FILE` - Path of the file-backed session store
//! - `MERCADO_RESTORE_STRATEGY` - `verify` or `trust-snapshot` (default: `verify`)
//! - `MERCADO_CATALOG_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `MERCADO_LOG_FORMAT` - `pretty` or `json` (default: `pretty`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// How `restore_session` hydrates the identity at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreStrategy {
    /// Re-fetch the profile with the persisted credential. Detects server-side
    /// revocation at startup.
    #[default]
    Verify,
    /// Trust the persisted identity snapshot without a network call.
    TrustSnapshot,
}

impl FromStr for RestoreStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verify" => Ok(Self::Verify),
            "trust-snapshot" | "trust_snapshot" => Ok(Self::TrustSnapshot),
            other => Err(format!("expected `verify` or `trust-snapshot`, got `{other}`")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Commerce API base URL, without a trailing slash.
    pub api_base_url: Url,
    /// Fixed client-side timeout applied to every request.
    pub request_timeout: Duration,
    /// Where the file-backed session store lives, if one is used.
    pub session_file: Option<PathBuf>,
    /// Session restore behaviour at startup.
    pub restore_strategy: RestoreStrategy,
    /// Lifetime of cached catalog entries.
    pub catalog_cache_ttl: Duration,
    /// Log output format.
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking.
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the API URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL does not parse or is
    /// not http(s).
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url(api_base_url)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: None,
            restore_strategy: RestoreStrategy::default(),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            log_format: LogFormat::default(),
            sentry_dsn: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::new(&get_env_or_default("MERCADO_API_BASE_URL", DEFAULT_BASE_URL))?;

        let timeout_secs = parse_env("MERCADO_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MERCADO_API_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        config.request_timeout = Duration::from_secs(timeout_secs);
        config.catalog_cache_ttl = Duration::from_secs(parse_env(
            "MERCADO_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_TTL_SECS,
        )?);
        config.session_file = get_optional_env("MERCADO_SESSION_FILE").map(PathBuf::from);
        config.restore_strategy = parse_env("MERCADO_RESTORE_STRATEGY", RestoreStrategy::default())?;
        config.log_format = parse_env("MERCADO_LOG_FORMAT", LogFormat::default())?;
        config.sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(config)
    }

    /// Base URL as a string without a trailing slash, ready for path joins.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base_url.as_str().trim_end_matches('/')
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and check the API base URL.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidBaseUrl(format!(
            "unsupported scheme `{other}`"
        ))),
    }
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new("http://localhost:5000/api").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.restore_strategy, RestoreStrategy::Verify);
        assert!(config.session_file.is_none());
    }

    #[test]
    fn test_api_base_strips_trailing_slash() {
        let config = ClientConfig::new("https://shop.example.com/api/").unwrap();
        assert_eq!(config.api_base(), "https://shop.example.com/api");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = ClientConfig::new("ftp://shop.example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn test_rejects_garbage_url() {
        assert!(ClientConfig::new("not a url").is_err());
    }

    #[test]
    fn test_restore_strategy_from_str() {
        assert_eq!("verify".parse::<RestoreStrategy>().unwrap(), RestoreStrategy::Verify);
        assert_eq!(
            "Trust-Snapshot".parse::<RestoreStrategy>().unwrap(),
            RestoreStrategy::TrustSnapshot
        );
        assert!("sometimes".parse::<RestoreStrategy>().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_env_missing_uses_default() {
        let value: u64 = parse_env("MERCADO_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
