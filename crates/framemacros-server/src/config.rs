//! Configuration for the explain server
//!
//! Loaded from `config.yaml` (path overridable with `FRAMEMACROS_CONFIG`).
//! Environment variables always override file values.

use framemacros_ir::TableSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "FRAMEMACROS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnvVar { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `framemacros_rewrite=trace`
    pub level: String,

    /// pretty, json or compact
    pub format: String,

    /// stdout, file or both
    pub output: String,

    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Table schemas calls can be explained against.
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl Config {
    /// Parse `path` and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Config::default();
                config.apply_env_overrides()?;
                Ok(config)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Config file location from `FRAMEMACROS_CONFIG`.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("FRAMEMACROS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("FRAMEMACROS_SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvVar {
                var: "FRAMEMACROS_SERVER_PORT",
                value: port,
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  host: "0.0.0.0"
  port: 8080
logging:
  level: "info"
  format: "json"
  output: "stdout"
  directory: "./logs"
tables:
  - name: people
    columns:
      - { name: name, data_type: string }
      - { name: age, data_type: int, nullable: true }
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_tables_and_env_override() {
        std::env::set_var("FRAMEMACROS_SERVER_HOST", "10.0.0.7");

        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.server.host, "10.0.0.7");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].index_of("age"), Some(1));
        assert!(config.tables[0].columns[1].nullable);

        std::env::remove_var("FRAMEMACROS_SERVER_HOST");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("framemacros-no-such-config.yaml");
        let config = Config::load_or_default(&path).unwrap();
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let config = Config::from_yaml("tables: []\n").unwrap();
        assert_eq!(config.logging.directory, "./logs");
    }
}
