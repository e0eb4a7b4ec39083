use crate::stock::{DEFAULT_SOURCE_URL, TableMarker};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;

const DEFAULT_TABLE_CLASSES: &str = "table my-table";
const DEFAULT_DATABASE_URL: &str = "site.db";
const DEFAULT_TIMEZONE: &str = "Asia/Kathmandu";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Signed cookies need at least this much key material.
pub const MIN_SECRET_KEY_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
    #[error("SECRET_KEY must be at least 64 bytes, got {0}")]
    SecretTooShort(usize),
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub source_url: Option<String>,
    pub table_classes: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub database_url: Option<String>,
    pub secret_key: Option<String>,
    pub display_timezone: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub source_url: String,
    pub table_marker: TableMarker,
    pub request_timeout: Duration,
    pub database_url: String,
    pub secret_key: Option<String>,
    pub display_timezone: Tz,
    pub environment: String,
    pub port: u16,
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        Self::from_yaml_config(yaml_config)
    }

    fn from_yaml_config(yaml_config: ConfigYaml) -> Result<Self, ConfigError> {
        let timezone = yaml_config
            .display_timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        Self::build(
            yaml_config.source_url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            yaml_config.table_classes.as_deref().unwrap_or(DEFAULT_TABLE_CLASSES),
            yaml_config.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            yaml_config.database_url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            yaml_config.secret_key,
            &timezone,
            yaml_config.environment.unwrap_or_else(|| "development".to_string()),
            yaml_config.port.unwrap_or(DEFAULT_PORT),
        )
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from a key lookup, using the same variable
    /// names as the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let request_timeout_secs = parse_or("REQUEST_TIMEOUT", lookup("REQUEST_TIMEOUT"), DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let table_classes = lookup("TABLE_CLASSES").unwrap_or_else(|| DEFAULT_TABLE_CLASSES.to_string());
        let timezone = lookup("DISPLAY_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        Self::build(
            lookup("SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            &table_classes,
            request_timeout_secs,
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            lookup("SECRET_KEY").filter(|s| !s.is_empty()),
            &timezone,
            lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        source_url: String,
        table_classes: &str,
        request_timeout_secs: u64,
        database_url: String,
        secret_key: Option<String>,
        timezone: &str,
        environment: String,
        port: u16,
    ) -> Result<Self, ConfigError> {
        let display_timezone: Tz = timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone.to_string()))?;

        let table_marker = TableMarker::parse(table_classes);
        if table_marker.classes.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "TABLE_CLASSES",
                value: table_classes.to_string(),
            });
        }

        if let Some(secret) = &secret_key {
            if secret.len() < MIN_SECRET_KEY_BYTES {
                return Err(ConfigError::SecretTooShort(secret.len()));
            }
        }

        Ok(Self {
            source_url,
            table_marker,
            request_timeout: Duration::from_secs(request_timeout_secs),
            database_url,
            secret_key,
            display_timezone,
            environment,
            port,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment != "production"
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.table_marker, TableMarker::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.database_url, "site.db");
        assert_eq!(config.display_timezone, chrono_tz::Asia::Kathmandu);
        assert_eq!(config.port, 5000);
        assert!(config.secret_key.is_none());
        assert!(config.is_development());
    }

    #[test]
    fn test_env_overrides() {
        let secret = "s".repeat(64);
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SOURCE_URL", "http://localhost:9000/today-price"),
            ("TABLE_CLASSES", "prices"),
            ("REQUEST_TIMEOUT", "5"),
            ("PORT", "8080"),
            ("ENVIRONMENT", "production"),
            ("SECRET_KEY", secret.as_str()),
            ("DISPLAY_TIMEZONE", "UTC"),
        ]))
        .unwrap();
        assert_eq!(config.source_url, "http://localhost:9000/today-price");
        assert_eq!(config.table_marker, TableMarker::parse("prices"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8080);
        assert!(!config.is_development());
        assert_eq!(config.secret_key.as_deref(), Some(secret.as_str()));
        assert_eq!(config.display_timezone, chrono_tz::UTC);
    }

    #[test]
    fn test_invalid_port() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn test_empty_table_classes_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("TABLE_CLASSES", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "TABLE_CLASSES", .. }));

        let err = AppConfig::from_yaml_str("table_classes: \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "TABLE_CLASSES", .. }));
    }

    #[test]
    fn test_invalid_timezone() {
        let err = AppConfig::from_lookup(lookup_from(&[("DISPLAY_TIMEZONE", "Mars/Olympus")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimezone(_)));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("SECRET_KEY", "your_secret_key")])).unwrap_err();
        assert!(matches!(err, ConfigError::SecretTooShort(15)));
    }

    #[test]
    fn test_yaml() {
        let config = AppConfig::from_yaml_str(
            "source_url: http://127.0.0.1:1/today-price\nport: 7000\ndatabase_url: /tmp/users.db\n",
        )
        .unwrap();
        assert_eq!(config.source_url, "http://127.0.0.1:1/today-price");
        assert_eq!(config.port, 7000);
        assert_eq!(config.database_url, "/tmp/users.db");
        assert_eq!(config.table_marker, TableMarker::default());
    }

    #[test]
    fn test_missing_yaml_file() {
        let err = AppConfig::from_yaml("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
