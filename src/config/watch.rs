use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// What the registry does when a subscriber's queue is full at publish time
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Terminate the session with `SubscriberOverrun`
    #[default]
    Disconnect,
    /// Drop the oldest pending snapshot in favor of the newest
    Coalesce,
}

/// Watch engine tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Interval between two resolutions of an active target
    ///
    /// **Default**: 10000
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound of a single resolver call; exceeding it counts as a
    /// transient failure
    ///
    /// **Default**: 3000
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// How long an unwatched target keeps its snapshot before removal, so a
    /// fast resubscribe avoids a cold resolve
    ///
    /// **Default**: 5000
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Depth of each subscriber's snapshot queue
    ///
    /// Only the newest snapshot matters to a watcher, so small values are
    /// preferred.
    ///
    /// **Default**: 4
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,

    /// **Default**: disconnect
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            grace_period_ms: default_grace_period_ms(),
            subscriber_buffer_size: default_subscriber_buffer_size(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Validates watch configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.poll_interval_ms must be greater than 0".into(),
            )));
        }

        if self.resolve_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.resolve_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.resolve_timeout_ms >= self.poll_interval_ms {
            warn!(
                "watch.resolve_timeout_ms ({}) is not shorter than poll_interval_ms ({}). \
                 Slow resolutions will delay every subsequent poll.",
                self.resolve_timeout_ms, self.poll_interval_ms
            );
        }

        if self.subscriber_buffer_size == 0 || self.subscriber_buffer_size > 64 {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch.subscriber_buffer_size {} must be within 1..=64",
                self.subscriber_buffer_size
            ))));
        }

        Ok(())
    }
}

const fn default_poll_interval_ms() -> u64 {
    10_000
}

const fn default_resolve_timeout_ms() -> u64 {
    3_000
}

const fn default_grace_period_ms() -> u64 {
    5_000
}

const fn default_subscriber_buffer_size() -> usize {
    4
}
