//! Configuration for the accumulation shim
//!
//! Settings come from an optional TOML file, then `METRICS_SHIM_*`
//! environment variables override individual fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Error loading or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(msg) => write!(f, "cannot parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub accumulator: AccumulatorConfig,
    pub store: StoreConfig,
    pub backend: BackendConfig,
    pub scheduler: SchedulerConfig,
    pub log: LogConfig,
}

/// Accumulator keyspace settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// Namespace prefix of every accumulator key (default: accumulator)
    pub key_prefix: String,
    /// Lifetime of a bucket record (default: 120s, two flush cycles)
    pub ttl_secs: u64,
    /// Bucket width; only 60 is accepted
    pub bucket_secs: u64,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        AccumulatorConfig {
            key_prefix: "accumulator".to_string(),
            ttl_secs: 120,
            bucket_secs: 60,
        }
    }
}

impl AccumulatorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Shared store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Monitoring backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the monitoring API
    pub endpoint: String,
    pub project_id: String,
    /// Metric types are `custom.<metric_namespace>/<name>`
    pub metric_namespace: String,
    pub timeout_ms: u64,
    pub bearer_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            endpoint: "https://monitoring.googleapis.com".to_string(),
            project_id: String::new(),
            metric_namespace: "googleapis.com".to_string(),
            timeout_ms: 10_000,
            bearer_token: None,
        }
    }
}

/// Flush scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds after each minute boundary at which the flush fires
    pub offset_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { offset_secs: 5 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset (default: info)
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ShimConfig {
    /// Load from an optional TOML file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => ShimConfig::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `METRICS_SHIM_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("METRICS_SHIM_KEY_PREFIX") {
            self.accumulator.key_prefix = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_TTL_SECS") {
            self.accumulator.ttl_secs = parse_number("METRICS_SHIM_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("METRICS_SHIM_REDIS_URL") {
            self.store.redis_url = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_BACKEND_ENDPOINT") {
            self.backend.endpoint = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_PROJECT_ID") {
            self.backend.project_id = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_METRIC_NAMESPACE") {
            self.backend.metric_namespace = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_BACKEND_TIMEOUT_MS") {
            self.backend.timeout_ms = parse_number("METRICS_SHIM_BACKEND_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("METRICS_SHIM_BEARER_TOKEN") {
            self.backend.bearer_token = Some(v);
        }
        if let Some(v) = lookup("METRICS_SHIM_FLUSH_OFFSET_SECS") {
            self.scheduler.offset_secs = parse_number("METRICS_SHIM_FLUSH_OFFSET_SECS", &v)?;
        }
        if let Some(v) = lookup("METRICS_SHIM_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("METRICS_SHIM_LOG_JSON") {
            self.log.json = v == "true" || v == "1";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.accumulator.key_prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("key_prefix must not be empty".to_string()));
        }
        if prefix.contains('|') {
            return Err(ConfigError::Invalid(format!(
                "key_prefix {:?} must not contain '|'",
                prefix
            )));
        }
        if self.accumulator.ttl_secs == 0 {
            return Err(ConfigError::Invalid("ttl_secs must be positive".to_string()));
        }
        if self.accumulator.bucket_secs != crate::accumulator::BUCKET_SECS {
            return Err(ConfigError::Invalid(format!(
                "bucket_secs must be {}, got {}",
                crate::accumulator::BUCKET_SECS,
                self.accumulator.bucket_secs
            )));
        }
        if self.scheduler.offset_secs >= crate::accumulator::BUCKET_SECS {
            return Err(ConfigError::Invalid(format!(
                "offset_secs must be below {}",
                crate::accumulator::BUCKET_SECS
            )));
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ShimConfig::default();
        assert_eq!(config.accumulator.key_prefix, "accumulator");
        assert_eq!(config.accumulator.ttl(), Duration::from_secs(120));
        assert_eq!(config.backend.metric_namespace, "googleapis.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ShimConfig::from_toml(
            r#"
            [backend]
            project_id = "my-project"

            [log]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.project_id, "my-project");
        assert_eq!(config.backend.timeout_ms, 10_000);
        assert!(config.log.json);
        assert_eq!(config.accumulator.ttl_secs, 120);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[accumulator]\nkey_prefix = \"acc\"").unwrap();

        let config = ShimConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.accumulator.key_prefix, "acc");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ShimConfig::from_toml("[accumulator]\nttl_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("METRICS_SHIM_KEY_PREFIX", "mon"),
            ("METRICS_SHIM_TTL_SECS", "300"),
            ("METRICS_SHIM_PROJECT_ID", "proj"),
            ("METRICS_SHIM_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = ShimConfig::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.accumulator.key_prefix, "mon");
        assert_eq!(config.accumulator.ttl_secs, 300);
        assert_eq!(config.backend.project_id, "proj");
        assert!(config.log.json);
    }

    #[test]
    fn test_bad_env_number() {
        let mut config = ShimConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "METRICS_SHIM_TTL_SECS").then(|| "two minutes".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ShimConfig::default();
        config.accumulator.key_prefix = "a|b".to_string();
        assert!(config.validate().is_err());

        let mut config = ShimConfig::default();
        config.accumulator.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ShimConfig::default();
        config.accumulator.bucket_secs = 300;
        assert!(config.validate().is_err());

        let mut config = ShimConfig::default();
        config.scheduler.offset_secs = 60;
        assert!(config.validate().is_err());
    }
}
