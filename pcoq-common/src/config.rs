//! TOML configuration loading
//!
//! Bootstrap settings for the server. Resolution order is applied by the
//! server binary: command line / environment, then this file, then the
//! built-in defaults below. A missing file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PCOQ_CONFIG";

/// Default PCO People API base URL
pub const DEFAULT_PCO_BASE_URL: &str = "https://api.planningcenteronline.com/people/v2";

/// Root of the TOML config file
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub pco: PcoSection,
    pub bulk: BulkSection,
    pub session: SessionSection,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub bind_address: String,
    pub port: u16,
    /// Largest accepted request body; bulk CSVs run to several megabytes
    pub max_body_bytes: usize,
}

/// Default request body cap (32 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8787,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Outbound PCO API settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PcoSection {
    /// Personal access token application id (or PCO_APPLICATION_ID)
    pub application_id: Option<String>,
    /// Personal access token secret (or PCO_SECRET)
    pub secret: Option<String>,
    pub base_url: String,
    pub max_requests_per_second: u32,
    /// Retries allowed after HTTP 429 before giving up
    pub max_retries: u32,
    /// Delay used when a 429 carries no usable Retry-After header
    pub default_retry_after_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for PcoSection {
    fn default() -> Self {
        Self {
            application_id: None,
            secret: None,
            base_url: DEFAULT_PCO_BASE_URL.to_string(),
            max_requests_per_second: crate::rate_limiter::DEFAULT_MAX_PER_SECOND,
            max_retries: 3,
            default_retry_after_ms: 5000,
            max_backoff_ms: 60_000,
            timeout_secs: 30,
        }
    }
}

/// Bulk update settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BulkSection {
    /// Rows processed at once; 1 means strictly sequential
    pub concurrency: usize,
}

impl Default for BulkSection {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Session store settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub ttl_minutes: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self { ttl_minutes: 60 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Platform default config file location (`<config dir>/pcoq/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pcoq").join("config.toml"))
}

/// Pick the config file: explicit path, then PCOQ_CONFIG, then platform default
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load a config file, falling back to defaults when it does not exist
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file location available, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_toml_config(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_toml_config(
            r#"
            [pco]
            max_requests_per_second = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.pco.max_requests_per_second, 5);
        assert_eq!(config.pco.max_retries, 3);
        assert_eq!(config.pco.base_url, DEFAULT_PCO_BASE_URL);
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = parse_toml_config("[pco\nport = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
