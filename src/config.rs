use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE_PATH, DEFAULT_LOG_LEVEL, ENV_DATABASE_PATH,
    ENV_LOG_DIR, ENV_LOG_LEVEL, ENV_METRICS_LISTEN, ENV_PRODUCTION,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily rolling JSON logs are written here when set
    pub directory: Option<PathBuf>,
    pub production: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub prometheus_listen: Option<SocketAddr>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            production: false,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    /// Load `path` and apply environment overrides. A missing file is not an
    /// error; every section falls back to its defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file '{}' not found, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup`, which maps an environment variable name to
    /// its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.logging.directory = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_PRODUCTION) {
            self.logging.production = parse_bool(ENV_PRODUCTION, &value)?;
        }
        if let Some(addr) = lookup(ENV_METRICS_LISTEN) {
            let addr = addr.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidValue {
                    key: ENV_METRICS_LISTEN.to_string(),
                    message: e.to_string(),
                }
            })?;
            self.metrics.prometheus_listen = Some(addr);
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.database.busy_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.logging.level, "info");
        assert!(config.metrics.prometheus_listen.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/var/lib/catalog.db"

            [logging]
            production = true
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/catalog.db"));
        assert_eq!(config.database.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.logging.production);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE_PATH, "/tmp/override.db"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_PRODUCTION, "yes"),
            (ENV_METRICS_LISTEN, "127.0.0.1:9100"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.production);
        assert_eq!(
            config.metrics.prometheus_listen,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == ENV_PRODUCTION).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let err = Config::from_toml("[database\npath = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
