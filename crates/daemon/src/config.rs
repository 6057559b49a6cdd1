//! Daemon configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file named by `QUEUEDESK_CONFIG`, then `QUEUEDESK_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use queuedesk_core::application::constants::DEFAULT_SUBSCRIBER_BUFFER;
use queuedesk_core::application::{RemainingScope, ServiceOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "QUEUEDESK_CONFIG";
const ENV_PREFIX: &str = "QUEUEDESK";

const DEFAULT_DB_PATH: &str = "~/.queuedesk/queuedesk.db";
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9530;
const MEMORY_DB: &str = ":memory:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    /// Directory for the daily-rolling log file; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
    pub remaining_scope: RemainingScope,
    pub subscriber_buffer: usize,
}

impl DaemonConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(file.as_deref(), None)
    }

    /// `env` replaces the process environment when given
    fn load_from(file: Option<&str>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("rpc_host", DEFAULT_RPC_HOST)?
            .set_default("rpc_port", i64::from(DEFAULT_RPC_PORT))?
            .set_default("log_format", "pretty")?
            .set_default("remaining_scope", "per_queue")?
            .set_default("subscriber_buffer", DEFAULT_SUBSCRIBER_BUFFER as i64)?;

        if let Some(path) = file {
            let path = shellexpand::tilde(path).into_owned();
            builder = builder.add_source(File::new(&path, FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let config: DaemonConfig = builder
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.subscriber_buffer == 0 {
            anyhow::bail!("subscriber_buffer must be > 0");
        }
        if self.db_path.trim().is_empty() {
            anyhow::bail!("db_path must not be empty");
        }
        Ok(())
    }

    /// sqlx URL for `db_path`; creates the parent directory of a file database
    pub fn database_url(&self) -> Result<String> {
        if self.db_path == MEMORY_DB {
            return Ok("sqlite::memory:".to_string());
        }

        let path = shellexpand::tilde(&self.db_path).into_owned();
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
        Ok(format!("sqlite://{}", path))
    }

    pub fn log_dir(&self) -> Option<String> {
        self.log_dir
            .as_deref()
            .map(|dir| shellexpand::tilde(dir).into_owned())
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            remaining_scope: self.remaining_scope,
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.rpc_host, DEFAULT_RPC_HOST);
        assert_eq!(config.rpc_port, DEFAULT_RPC_PORT);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
        assert_eq!(config.remaining_scope, RemainingScope::PerQueue);
        assert_eq!(config.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
    }

    #[test]
    fn test_environment_overrides() {
        let config = DaemonConfig::load_from(
            None,
            env(&[
                ("QUEUEDESK_RPC_PORT", "9999"),
                ("QUEUEDESK_LOG_FORMAT", "json"),
                ("QUEUEDESK_REMAINING_SCOPE", "global"),
                ("QUEUEDESK_DB_PATH", ":memory:"),
            ]),
        )
        .unwrap();

        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.remaining_scope, RemainingScope::Global);
        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(DaemonConfig::load_from(None, env(&[("QUEUEDESK_RPC_PORT", "http")])).is_err());
        assert!(
            DaemonConfig::load_from(None, env(&[("QUEUEDESK_SUBSCRIBER_BUFFER", "0")])).is_err()
        );
        assert!(
            DaemonConfig::load_from(None, env(&[("QUEUEDESK_REMAINING_SCOPE", "everywhere")]))
                .is_err()
        );
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = DaemonConfig::load_from(Some("/nonexistent/queuedesk.toml"), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_database_url_for_file() {
        let dir = std::env::temp_dir().join(format!("queuedesk-config-{}", std::process::id()));
        let db = dir.join("nested").join("queuedesk.db");
        let config = DaemonConfig::load_from(
            None,
            env(&[("QUEUEDESK_DB_PATH", db.to_str().unwrap())]),
        )
        .unwrap();

        let url = config.database_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(db.parent().unwrap().exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
