use crate::core::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the shared runtime backing default executors and timers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    // Worker pool configuration
    /// Number of async worker threads driving timers and dispatch
    pub worker_threads: usize,
    /// Upper bound on threads running continuation bodies
    pub max_blocking_threads: usize,
    /// How long an idle blocking thread is kept before it exits
    #[serde(with = "duration_ms")]
    pub thread_keep_alive: Duration,
    /// Prefix for runtime thread names
    pub thread_name: String,

    // Diagnostics
    /// Collect process-wide cell counters
    pub enable_metrics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let cpu_count = num_cpus::get();

        Self {
            worker_threads: cpu_count.max(2),
            max_blocking_threads: 512,
            thread_keep_alive: Duration::from_secs(10),
            thread_name: "cellflow-worker".to_string(),
            enable_metrics: true,
        }
    }
}

impl RuntimeConfig {
    /// Create a new builder for RuntimeConfig
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Parse a configuration from YAML, filling omitted fields with defaults
    pub fn from_yaml(source: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(ConfigError::invalid("worker_threads must be greater than 0"));
        }
        if self.max_blocking_threads == 0 {
            return Err(ConfigError::invalid(
                "max_blocking_threads must be greater than 0",
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::invalid("thread_name cannot be empty"));
        }
        Ok(())
    }

    /// Small pool suited to tests and local development
    pub fn development() -> Self {
        Self {
            worker_threads: 2,
            max_blocking_threads: 64,
            thread_keep_alive: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Larger pool for callback-heavy services
    pub fn high_throughput() -> Self {
        let cpu_count = num_cpus::get();

        Self {
            worker_threads: cpu_count * 2,
            max_blocking_threads: 2048,
            thread_keep_alive: Duration::from_secs(60),
            ..Default::default()
        }
    }
}

/// Builder for RuntimeConfig
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.config.worker_threads = worker_threads;
        self
    }

    pub fn max_blocking_threads(mut self, max_blocking_threads: usize) -> Self {
        self.config.max_blocking_threads = max_blocking_threads;
        self
    }

    pub fn thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.thread_keep_alive = keep_alive;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Enable/disable metrics
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).map_err(S::Error::custom)?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads >= 2);
    }

    #[test]
    fn test_presets() {
        let dev = RuntimeConfig::development();
        assert!(dev.validate().is_ok());
        assert_eq!(dev.worker_threads, 2);

        let heavy = RuntimeConfig::high_throughput();
        assert!(heavy.validate().is_ok());
        assert!(heavy.max_blocking_threads > dev.max_blocking_threads);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RuntimeConfig::default();

        config.worker_threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.worker_threads = 4;

        config.max_blocking_threads = 0;
        assert!(config.validate().is_err());
        config.max_blocking_threads = 8;

        config.thread_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::builder()
            .worker_threads(3)
            .max_blocking_threads(16)
            .thread_keep_alive(Duration::from_millis(250))
            .thread_name("cells")
            .metrics(false)
            .build()
            .unwrap();

        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.max_blocking_threads, 16);
        assert_eq!(config.thread_keep_alive, Duration::from_millis(250));
        assert_eq!(config.thread_name, "cells");
        assert!(!config.enable_metrics);

        assert!(RuntimeConfig::builder().worker_threads(0).build().is_err());
    }

    #[test]
    fn test_from_yaml() {
        let config = RuntimeConfig::from_yaml(
            "worker_threads: 6\nthread_keep_alive: 1500\nthread_name: yaml-pool\n",
        )
        .unwrap();
        assert_eq!(config.worker_threads, 6);
        assert_eq!(config.thread_keep_alive, Duration::from_millis(1500));
        assert_eq!(config.thread_name, "yaml-pool");
        assert_eq!(config.max_blocking_threads, 512);

        assert!(matches!(
            RuntimeConfig::from_yaml("worker_threads: [1, 2]"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("worker_threads: 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_keep_alive_serialization() {
        let config = RuntimeConfig::builder()
            .thread_keep_alive(Duration::from_millis(1500))
            .build()
            .unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("thread_keep_alive: 1500"));

        let mut oversized = RuntimeConfig::default();
        oversized.thread_keep_alive = Duration::MAX;
        assert!(serde_yaml::to_string(&oversized).is_err());
    }
}
