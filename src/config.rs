//! Configuration loader and validator for the on-deck optimizer service.
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub plex: Plex,
    pub schedule: Schedule,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub bind: String,
    #[serde(default = "default_secrets_path")]
    pub secrets_path: String,
}

/// Media server selection and optimize parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plex {
    pub server_name: String,
    #[serde(default = "default_target_tag_id")]
    pub target_tag_id: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub client_identifier: Option<String>,
}

/// Daily trigger time, local clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub hour: u32,
}

fn default_secrets_path() -> String {
    "/config/secrets.json".to_string()
}

fn default_target_tag_id() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/optimizer.db?mode=rwc", self.app.data_dir))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.app
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid("app.bind must be a socket address"))
    }

    pub fn secrets_path(&self) -> PathBuf {
        PathBuf::from(&self.app.secrets_path)
    }

    /// Six-field cron expression firing once a day at `schedule.hour`.
    pub fn cron_expression(&self) -> String {
        format!("0 0 {} * * *", self.schedule.hour)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    cfg.bind_addr()?;
    if cfg.app.secrets_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.secrets_path must be non-empty"));
    }

    if cfg.plex.server_name.trim().is_empty() {
        return Err(ConfigError::Invalid("plex.server_name must be non-empty"));
    }
    if cfg.plex.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("plex.request_timeout_secs must be > 0"));
    }
    if let Some(id) = &cfg.plex.client_identifier {
        if id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "plex.client_identifier must be non-empty when set",
            ));
        }
    }

    if cfg.schedule.hour > 23 {
        return Err(ConfigError::Invalid("schedule.hour must be in 0..=23"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the service.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  bind: "0.0.0.0:5000"
  secrets_path: "/config/secrets.json"

plex:
  server_name: "EA-NAS"
  target_tag_id: 3
  request_timeout_secs: 30

schedule:
  hour: 3
"#
}
