//! Configuration loading for the SINISTRO console.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use sinistro_core::CollectionName;
use sinistro_storage::{CacheSettings, TtlPolicy};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::selection::RendererConfig;

const CONFIG_ENV: &str = "SINISTRO_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuiConfig {
    pub api_base_url: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    pub refresh_interval_ms: u64,
    pub log: LogConfig,
    pub cache: CacheSettings,
    /// Per-collection TTL overrides, in hours. Optional.
    #[serde(default)]
    pub ttl: HashMap<CollectionName, u64>,
    pub selection: RendererConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub path: PathBuf,
    /// `EnvFilter` directives, e.g. `"sinistro_storage=debug,info"`.
    pub filter: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or SINISTRO_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl TuiConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: TuiConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.jwt.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or jwt must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.log.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.filter",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.namespace.trim().is_empty() || self.cache.namespace.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "cache.namespace",
                reason: "must be non-empty and must not contain ':'".to_string(),
            });
        }
        if self.cache.format_version.trim().is_empty() || self.cache.format_version.contains('_') {
            return Err(ConfigError::InvalidValue {
                field: "cache.format_version",
                reason: "must be non-empty and must not contain '_'".to_string(),
            });
        }
        if self.cache.max_size_mb == 0 || self.cache.max_size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_size_mb",
                reason: "must be > 0 and fit the address space in bytes".to_string(),
            });
        }
        if let Some((name, _)) = self.ttl.iter().find(|(_, hours)| **hours == 0) {
            return Err(ConfigError::InvalidValue {
                field: "ttl",
                reason: format!("{} must be > 0 hours", name.slug()),
            });
        }
        if self.selection.initial_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "selection.initial_batch",
                reason: "must be > 0".to_string(),
            });
        }
        if self.selection.batch_increment == 0 {
            return Err(ConfigError::InvalidValue {
                field: "selection.batch_increment",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Default TTLs with the configured overrides applied.
    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl
            .iter()
            .fold(TtlPolicy::new(), |policy, (name, hours)| {
                policy.with_ttl(*name, Duration::from_secs(hours.saturating_mul(3600)))
            })
    }
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(value));
        }
    }
    None
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
api_base_url = "http://localhost:3000"
request_timeout_ms = 5000
refresh_interval_ms = 250

[auth]
jwt = "token"

[log]
path = "tmp/sinistro.log"
filter = "info"

[cache]
path = "tmp/refdata"
namespace = "sinistro"
format_version = "2"
max_size_mb = 16
sweep_on_init = true

[ttl]
brands = 12

[selection]
initial_batch = 200
batch_increment = 200
search_debounce_ms = 150
load_more_threshold = 48
"#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config = TuiConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.selection, RendererConfig::default());
        assert_eq!(
            config.ttl_policy().ttl_for(CollectionName::Brands),
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(
            config.ttl_policy().ttl_for(CollectionName::States),
            CollectionName::States.default_ttl()
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let contents = SAMPLE.replace("sweep_on_init = true", "sweep_on_init = true\nbogus = 1");
        assert!(matches!(
            TuiConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unknown_collection_in_ttl_is_rejected() {
        let contents = SAMPLE.replace("brands = 12", "vehicles = 12");
        assert!(TuiConfig::from_toml(&contents).is_err());
    }

    #[test]
    fn zero_ttl_is_invalid() {
        let contents = SAMPLE.replace("brands = 12", "brands = 0");
        let config = TuiConfig::from_toml(&contents).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "ttl", .. })
        ));
    }

    #[test]
    fn oversized_cache_map_is_invalid() {
        let contents = SAMPLE.replace(
            "max_size_mb = 16",
            &format!("max_size_mb = {}", i64::MAX),
        );
        let config = TuiConfig::from_toml(&contents).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "cache.max_size_mb", .. })
        ));
    }
}
