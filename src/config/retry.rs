use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Backoff applied by the poll loop after transient resolver failures.
///
/// The delay for attempt `n` (0-indexed) is `base_delay_ms × 2^n`, capped at
/// `max_delay_ms`, then shortened by a random fraction of at most
/// `jitter_ratio`. The base is derived from the attempt number alone, so the
/// jitter never feeds back into later delays.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Consecutive failures tolerated before the target is failed (0 means unlimited)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Fraction of the delay that may be randomly shaved off, in `[0, 1)`
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay for the given attempt
    pub fn base_delay(
        &self,
        attempt: u32,
    ) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Jittered delay for the given attempt
    pub fn delay_for(
        &self,
        attempt: u32,
    ) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_ratio <= 0.0 {
            return base;
        }
        let shave = rand::thread_rng().gen_range(0.0..=self.jitter_ratio);
        base.mul_f64(1.0 - shave)
    }

    /// Whether `failures` consecutive failures exceed the retry budget
    pub fn exhausted(
        &self,
        failures: u32,
    ) -> bool {
        self.max_retries != 0 && failures > self.max_retries
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.base_delay_ms must be greater than 0".into(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.max_delay_ms {} must be >= base_delay_ms {}",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.jitter_ratio {} must be within [0, 1)",
                self.jitter_ratio
            ))));
        }

        Ok(())
    }
}

fn default_max_retries() -> u32 {
    10
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_jitter_ratio() -> f64 {
    0.2
}
