//! Daemon configuration
//!
//! Layers, lowest priority first: built-in defaults, optional TOML file
//! (`HOOKLINE_CONFIG`, default `hookline.toml`), `HOOKLINE_*` environment.

use config::{Config, Environment, File};
use hookline_core::error::{AppError, Result};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "HOOKLINE";
const CONFIG_PATH_ENV: &str = "HOOKLINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "hookline.toml";
const DEFAULT_DB_PATH: &str = "~/.hookline/hookline.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub poll_interval_secs: u64,
    pub batch_size: usize,
    pub http_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub retention_days: u32,
    pub retention_interval_hours: u64,
    /// Per-subscription delivery throttle; 0 disables
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: f64,
    /// Per-method RPC throttle; 0 disables
    pub rpc_rate_limit_burst: u32,
    pub rpc_rate_limit_per_sec: f64,
    pub log_format: String,
    pub log_dir: Option<String>,
}

impl Settings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Some(&path), None)
    }

    /// Load with an explicit config file and environment map (None = process env)
    pub fn load_from(
        config_path: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database_url", DEFAULT_DB_PATH)
            .and_then(|b| b.set_default("rpc_host", "127.0.0.1"))
            .and_then(|b| b.set_default("rpc_port", 9630))
            .and_then(|b| b.set_default("poll_interval_secs", 10))
            .and_then(|b| b.set_default("batch_size", 100))
            .and_then(|b| b.set_default("http_timeout_secs", 30))
            .and_then(|b| b.set_default("shutdown_grace_secs", 5))
            .and_then(|b| b.set_default("retention_days", 30))
            .and_then(|b| b.set_default("retention_interval_hours", 24))
            .and_then(|b| b.set_default("rate_limit_burst", 0))
            .and_then(|b| b.set_default("rate_limit_per_sec", 0.0))
            .and_then(|b| b.set_default("rpc_rate_limit_burst", 200))
            .and_then(|b| b.set_default("rpc_rate_limit_per_sec", 100.0))
            .and_then(|b| b.set_default("log_format", "pretty"))
            .map_err(config_error)?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("poll_interval_secs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config("batch_size must be positive".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("http_timeout_secs must be positive".to_string()));
        }
        if self.retention_interval_hours == 0 {
            return Err(AppError::Config(
                "retention_interval_hours must be positive".to_string(),
            ));
        }
        if self.rate_limit_per_sec < 0.0 || self.rpc_rate_limit_per_sec < 0.0 {
            return Err(AppError::Config("rate limits must not be negative".to_string()));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        match self.log_format.as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "log_format must be \"pretty\" or \"json\", got {:?}",
                other
            ))),
        }
    }

    /// sqlx connection URL with `~` expanded
    pub fn sqlite_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            return self.database_url.clone();
        }
        format!("sqlite://{}", self.database_path())
    }

    /// Filesystem path of the database (tilde-expanded)
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database_url).into_owned()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_hours * 3600)
    }

    pub fn log_dir(&self) -> Option<String> {
        self.log_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| shellexpand::tilde(d).into_owned())
    }
}

fn config_error(e: config::ConfigError) -> AppError {
    AppError::Config(e.to_string())
}
