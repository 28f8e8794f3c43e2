//! Exponential reconnect backoff with a fixed attempt budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for reconnect backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Reconnect attempts allowed before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 1_000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_max_delay_ms() -> u64 { 60_000 }

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffConfig {
    /// Delay before the `attempt`-th reconnect (1-based):
    /// `base * multiplier^(attempt - 1)`, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.base_delay_ms as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Stateful attempt counter on top of [`BackoffConfig`].
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    attempts: u32,
}

impl ReconnectBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempts: 0 }
    }

    /// Consume one attempt and return its delay.
    ///
    /// Returns `None` once `max_attempts` have been used; the counter is left
    /// untouched in that case.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.config.delay_for(self.attempts))
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Called after a successful socket open or an explicit reconnect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
