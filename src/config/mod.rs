//! Configuration management for the endpoint-watch service.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation

mod monitoring;
mod resolver;
mod retry;
mod server;
mod watch;
pub use monitoring::*;
pub use resolver::*;
pub use retry::*;
pub use server::*;
pub use watch::*;

#[cfg(test)]
mod config_test;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Prefix of environment overrides, e.g. `SERVOK__WATCH__POLL_INTERVAL_MS`
pub const ENV_PREFIX: &str = "SERVOK";

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServokConfig {
    /// gRPC listener and transport parameters
    #[serde(default)]
    pub server: ServerConfig,
    /// Poll cadence, grace period and subscriber queue settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Backoff applied to transient resolver failures
    #[serde(default)]
    pub retry: BackoffPolicy,
    /// Discovery backend selection
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Metrics exposure
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl ServokConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in order (later sources override earlier):
    /// 1. Type defaults
    /// 2. File from the `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with the `SERVOK__` prefix
    ///
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/servok.toml");
    /// std::env::set_var("SERVOK__WATCH__POLL_INTERVAL_MS", "5000");
    /// let cfg = ServokConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Merging order: current values, the new file, then the latest
    /// environment variables.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.watch.validate()?;
        self.retry.validate()?;
        self.resolver.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
