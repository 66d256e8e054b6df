//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Region;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the match-data API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Upper bound on a single match-detail fetch inside a fan-out
    #[serde(default = "default_detail_timeout")]
    pub detail_timeout_seconds: u64,

    /// Concurrent match-detail fetches per request
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://api.henrikdev.xyz".to_string()
}

fn default_api_key_env() -> String {
    "VAL_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_detail_timeout() -> u64 {
    15
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_retry_delay() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_user_agent() -> String {
    format!("val-tracker/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
            detail_timeout_seconds: default_detail_timeout(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Longest accepted cache TTL (one week).
pub const MAX_CACHE_TTL_SECONDS: u64 = 7 * 24 * 3600;

fn default_ttl() -> u64 {
    300
}

fn default_max_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

/// Profile assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Matches fetched when building a profile
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    #[serde(default)]
    pub default_region: Region,
}

fn default_recent_window() -> usize {
    5
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
            default_region: Region::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            profile: ProfileConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.upstream.base_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Upstream base_url is not a valid URL: {}",
                self.upstream.base_url
            )));
        }

        if self.upstream.timeout_seconds == 0 || self.upstream.detail_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream timeouts must be greater than 0".to_string(),
            ));
        }

        if self.upstream.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.upstream.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "Upstream backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "Cache ttl_seconds must be at most {}",
                MAX_CACHE_TTL_SECONDS
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "Cache max_entries must be greater than 0".to_string(),
            ));
        }

        if self.profile.recent_window == 0 {
            return Err(ConfigError::ValidationError(
                "Profile recent_window must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.profile.recent_window, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_upstream_config_default() {
        let upstream = UpstreamConfig::default();

        assert_eq!(upstream.base_url, "https://api.henrikdev.xyz");
        assert_eq!(upstream.api_key_env, "VAL_API_KEY");
        assert_eq!(upstream.max_concurrency, 4);
        assert_eq!(upstream.max_retries, 3);
        assert!(upstream.user_agent.starts_with("val-tracker/"));
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_base_url() {
        let mut config = AppConfig::default();
        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_concurrency() {
        let mut config = AppConfig::default();
        config.upstream.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_window() {
        let mut config = AppConfig::default();
        config.profile.recent_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_huge_cache_ttl() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            ttl_seconds = 9223372036854775807
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cache.ttl_seconds = MAX_CACHE_TTL_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [cache]
            ttl_seconds = 60

            [profile]
            default_region = "na"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.profile.default_region, Region::Na);
        assert_eq!(config.upstream.max_concurrency, 4);
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\n[server]\nport = 9000\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.profile.default_region, parsed.profile.default_region);
    }
}
