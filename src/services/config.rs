//! Configuration management for the stackhive system.
//!
//! Layering: built-in defaults, then `stackhive.yaml`, then environment
//! variables prefixed `STACKHIVE_` (nested keys joined with `__`, e.g.
//! `STACKHIVE_SERVER__PORT=9000`). Provider API keys stay in their own
//! well-known variables and are read by the provider configs directly.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Validation failed for {field}: {reason}")]
    ValidationError { field: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerSettings,
    pub llm: LlmSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/stackhive.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between fan-out passes.
    pub tick_interval_secs: u64,
    /// A running cycle older than this is stuck and gets reaped.
    pub stale_after_secs: u64,
    /// Hard deadline on a spawned cycle chain; overruns are cancelled.
    pub cycle_deadline_secs: u64,
    /// Wall-clock budget per graph node.
    pub node_timeout_secs: u64,
    /// Back-to-back continue cycles before yielding to the tick.
    pub max_continues: u32,
    /// Shutdown drain budget.
    pub drain_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            stale_after_secs: 60,
            cycle_deadline_secs: 60,
            node_timeout_secs: 60,
            max_continues: 10,
            drain_timeout_secs: 60,
        }
    }
}

impl SchedulerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider preference; providers without keys are skipped.
    pub provider_order: Vec<String>,
    /// Default per-call deadline.
    pub request_timeout_secs: u64,
    /// Builder calls get a larger budget.
    pub builder_request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider_order: crate::adapters::llm::DEFAULT_PROVIDER_ORDER
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            request_timeout_secs: 30,
            builder_request_timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn builder_request_timeout(&self) -> Duration {
        Duration::from_secs(self.builder_request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    /// Log file directory for daemon mode; stderr when absent.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

/// Load configuration from defaults, optional YAML file, and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from(Path::new("stackhive.yaml"))
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("STACKHIVE_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "scheduler.tick_interval_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.scheduler.stale_after_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "scheduler.stale_after_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.scheduler.cycle_deadline_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "scheduler.cycle_deadline_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.llm.provider_order.is_empty() {
            return Err(ConfigError::ValidationError {
                field: "llm.provider_order".to_string(),
                reason: "at least one provider must be listed".to_string(),
            });
        }
        Ok(())
    }
}
