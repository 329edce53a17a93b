use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a TOML settings file.
pub const CONFIG_ENV: &str = "GEMSTONE_CONFIG";
const ENV_PREFIX: &str = "GEMSTONE_";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(SettingsError::InvalidValue(format!(
                "log_format must be `pretty` or `json` (got `{other}`)"
            ))),
        }
    }
}

/// Server settings.
///
/// Resolved in three layers: built-in defaults, then the TOML file named by
/// `GEMSTONE_CONFIG`, then `GEMSTONE_<FIELD>` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single engine call, storage included
    pub storage_timeout_ms: u64,
    pub hub_intake_capacity: usize,
    /// Payloads buffered per connection before it is dropped
    pub outbound_queue_capacity: usize,
    pub keep_alive_secs: u64,
    pub log_format: LogFormat,
    /// JSON card and noble catalog; the built-in set when absent
    pub catalog_path: Option<PathBuf>,
    /// Fixed shuffle seed, for reproducible deals
    pub seed: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            storage_timeout_ms: 2000,
            hub_intake_capacity: 1024,
            outbound_queue_capacity: 256,
            keep_alive_secs: 15,
            log_format: LogFormat::Pretty,
            catalog_path: None,
            seed: None,
        }
    }
}

impl AppSettings {
    /// Defaults, overlaid with the file named by `GEMSTONE_CONFIG` and then
    /// the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads a TOML file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Overrides fields from variables such as `GEMSTONE_PORT`. Empty values
    /// are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: &str| {
            lookup(&format!("{ENV_PREFIX}{}", field.to_ascii_uppercase()))
                .filter(|value| !value.is_empty())
        };

        if let Some(host) = var("host") {
            self.host = host;
        }
        if let Some(port) = var("port") {
            self.port = parse_field("port", &port)?;
        }
        if let Some(timeout) = var("storage_timeout_ms") {
            self.storage_timeout_ms = parse_field("storage_timeout_ms", &timeout)?;
        }
        if let Some(capacity) = var("hub_intake_capacity") {
            self.hub_intake_capacity = parse_field("hub_intake_capacity", &capacity)?;
        }
        if let Some(capacity) = var("outbound_queue_capacity") {
            self.outbound_queue_capacity = parse_field("outbound_queue_capacity", &capacity)?;
        }
        if let Some(secs) = var("keep_alive_secs") {
            self.keep_alive_secs = parse_field("keep_alive_secs", &secs)?;
        }
        if let Some(format) = var("log_format") {
            self.log_format = format.parse()?;
        }
        if let Some(path) = var("catalog_path") {
            self.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(seed) = var("seed") {
            self.seed = Some(parse_field("seed", &seed)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "host cannot be empty".to_string(),
            ));
        }
        if self.storage_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "storage_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.hub_intake_capacity == 0 || self.outbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "hub_intake_capacity and outbound_queue_capacity must be greater than 0"
                    .to_string(),
            ));
        }
        if self.keep_alive_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "keep_alive_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue(format!("invalid {field}: `{value}`")))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Failed to read settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}
