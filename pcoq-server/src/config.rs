//! Runtime configuration for pcoq-server
//!
//! Priority: command line (with environment fallbacks) → TOML file →
//! built-in defaults. PCO credentials are required.

use clap::Parser;
use pcoq_common::config::{load_toml_config, resolve_config_path, TomlConfig};
use pcoq_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::services::PcoClientConfig;

/// Command-line arguments for pcoq-server
#[derive(Parser, Clone, Default)]
#[command(name = "pcoq-server")]
#[command(about = "Planning Center People query and bulk update service")]
#[command(version)]
pub struct Args {
    /// Config file (default: $PCOQ_CONFIG, then <config dir>/pcoq/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PCOQ_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "PCOQ_BIND")]
    pub bind: Option<String>,

    /// PCO personal access token application id
    #[arg(long, env = "PCO_APPLICATION_ID", hide_env_values = true)]
    pub application_id: Option<String>,

    /// PCO personal access token secret
    #[arg(long, env = "PCO_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// PCO People API base URL
    #[arg(long, env = "PCO_BASE_URL")]
    pub base_url: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub pco: PcoClientConfig,
    pub bulk_concurrency: usize,
    pub session_ttl: Duration,
    pub log_level: String,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ServerConfig {
    /// Merge arguments over a loaded TOML config
    pub fn resolve(args: &Args, toml: TomlConfig) -> Result<Self> {
        let TomlConfig {
            server,
            mut pco,
            bulk,
            session,
            logging,
        } = toml;

        let application_id = non_blank(args.application_id.as_ref())
            .or_else(|| non_blank(pco.application_id.as_ref()));
        let secret = non_blank(args.secret.as_ref()).or_else(|| non_blank(pco.secret.as_ref()));

        let (Some(application_id), Some(secret)) = (application_id, secret) else {
            return Err(Error::Config(
                "PCO credentials not configured. Set PCO_APPLICATION_ID and PCO_SECRET, \
                 or application_id and secret under [pco] in the config file"
                    .to_string(),
            ));
        };

        if let Some(base_url) = non_blank(args.base_url.as_ref()) {
            pco.base_url = base_url;
        }

        Ok(Self {
            bind_address: non_blank(args.bind.as_ref()).unwrap_or(server.bind_address),
            port: args.port.unwrap_or(server.port),
            max_body_bytes: server.max_body_bytes.max(1024),
            pco: PcoClientConfig::from_section(&pco, application_id, secret),
            bulk_concurrency: bulk.concurrency.max(1),
            session_ttl: Duration::from_secs(session.ttl_minutes.max(1) * 60),
            log_level: non_blank(args.log_level.as_ref()).unwrap_or(logging.level),
        })
    }

    /// Read the TOML file named by the arguments and merge
    pub fn load(args: &Args) -> Result<Self> {
        let path = resolve_config_path(args.config.as_deref());
        let toml = load_toml_config(path.as_deref())?;
        let config = Self::resolve(args, toml)?;

        info!(
            bind = %config.bind_address,
            port = config.port,
            max_body_bytes = config.max_body_bytes,
            base_url = %config.pco.base_url,
            max_requests_per_second = config.pco.max_requests_per_second,
            bulk_concurrency = config.bulk_concurrency,
            "Configuration resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcoq_common::config::parse_toml_config;

    fn with_credentials() -> Args {
        Args {
            application_id: Some("cli-app".into()),
            secret: Some("cli-secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = ServerConfig::resolve(&Args::default(), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let blank = Args {
            application_id: Some("  ".into()),
            secret: Some("s".into()),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(&blank, TomlConfig::default()).is_err());
    }

    #[test]
    fn test_defaults_apply() {
        let config = ServerConfig::resolve(&with_credentials(), TomlConfig::default()).unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.max_body_bytes, 32 * 1024 * 1024);
        assert_eq!(config.pco.max_requests_per_second, 2);
        assert_eq!(config.pco.max_retries, 3);
        assert_eq!(config.pco.default_retry_after, Duration::from_millis(5000));
        assert_eq!(config.bulk_concurrency, 1);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_arguments_override_toml() {
        let toml = parse_toml_config(
            r#"
            [server]
            port = 9000
            bind_address = "0.0.0.0"
            [pco]
            application_id = "toml-app"
            secret = "toml-secret"
            base_url = "http://toml.example"
            "#,
        )
        .unwrap();

        let args = Args {
            port: Some(9100),
            base_url: Some("http://cli.example".into()),
            ..with_credentials()
        };
        let config = ServerConfig::resolve(&args, toml).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.pco.application_id, "cli-app");
        assert_eq!(config.pco.base_url, "http://cli.example");
    }

    #[test]
    fn test_toml_credentials_used_without_arguments() {
        let toml = parse_toml_config(
            r#"
            [pco]
            application_id = "toml-app"
            secret = "toml-secret"
            [bulk]
            concurrency = 0
            "#,
        )
        .unwrap();

        let config = ServerConfig::resolve(&Args::default(), toml).unwrap();
        assert_eq!(config.pco.application_id, "toml-app");
        assert_eq!(config.pco.secret, "toml-secret");
        assert_eq!(config.bulk_concurrency, 1);
    }
}
