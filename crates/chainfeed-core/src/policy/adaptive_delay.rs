//! Adaptive inter-request delay.
//!
//! Each fetch kind keeps its own delay. A rate-limit signal (HTTP 429)
//! multiplies it by `increase_factor` up to `cap_ms`; every other successful
//! response multiplies it by `decay_factor` down to `floor_ms`. The delay
//! starts unset (no wait) and is seeded from `seed_ms` on the first signal.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Adaptive delay configuration for one fetch kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveDelayConfig {
    /// Value the delay is taken to have before the first signal.
    pub seed_ms: u64,
    /// Lower bound reached by repeated successes.
    pub floor_ms: u64,
    /// Upper bound reached by repeated rate limiting.
    pub cap_ms: u64,
    #[serde(default = "default_increase")]
    pub increase_factor: f64,
    #[serde(default = "default_decay")]
    pub decay_factor: f64,
}

fn default_increase() -> f64 { 2.0 }
fn default_decay() -> f64 { 0.9 }

impl AdaptiveDelayConfig {
    /// Block-body fetches: seed 200ms, floor 100ms, cap 3s.
    pub fn block_fetch() -> Self {
        Self {
            seed_ms: 200,
            floor_ms: 100,
            cap_ms: 3_000,
            increase_factor: default_increase(),
            decay_factor: default_decay(),
        }
    }

    /// Transaction fetches: seed 100ms, floor 100ms, cap 2s.
    pub fn transaction_fetch() -> Self {
        Self {
            seed_ms: 100,
            floor_ms: 100,
            cap_ms: 2_000,
            increase_factor: default_increase(),
            decay_factor: default_decay(),
        }
    }

    /// Check the factors and bounds; `name` prefixes the error message.
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if !self.increase_factor.is_finite() || self.increase_factor < 1.0 {
            return Err(format!("{name}.increaseFactor must be a finite number >= 1"));
        }
        if !self.decay_factor.is_finite() || self.decay_factor <= 0.0 || self.decay_factor > 1.0 {
            return Err(format!("{name}.decayFactor must be in (0, 1]"));
        }
        if self.floor_ms > self.cap_ms {
            return Err(format!("{name}.floorMs must not exceed {name}.capMs"));
        }
        Ok(())
    }
}

/// What a completed request tells the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySignal {
    /// The endpoint answered HTTP 429.
    RateLimited,
    /// The endpoint answered with any successful status.
    Success,
    /// Timeout or network failure: no information about load.
    Neutral,
}

/// Multiplicative-increase / multiplicative-decrease delay controller.
#[derive(Debug, Clone)]
pub struct AdaptiveDelay {
    config: AdaptiveDelayConfig,
    current_ms: Option<f64>,
}

impl AdaptiveDelay {
    pub fn new(config: AdaptiveDelayConfig) -> Self {
        Self {
            config,
            current_ms: None,
        }
    }

    /// Feed one request outcome into the controller.
    pub fn observe(&mut self, signal: DelaySignal) {
        match signal {
            DelaySignal::RateLimited => self.on_rate_limited(),
            DelaySignal::Success => self.on_success(),
            DelaySignal::Neutral => {}
        }
    }

    pub fn on_rate_limited(&mut self) {
        let next = self.base() * self.config.increase_factor;
        self.current_ms = Some(next.min(self.config.cap_ms as f64));
        tracing::debug!(delay_ms = self.current_ms(), "rate limited, delay increased");
    }

    pub fn on_success(&mut self) {
        let next = self.base() * self.config.decay_factor;
        self.current_ms = Some(next.max(self.config.floor_ms as f64));
    }

    /// Current delay in milliseconds (0 while unset).
    pub fn current_ms(&self) -> f64 {
        self.current_ms.unwrap_or(0.0)
    }

    /// Current delay as a `Duration` to await before the next request.
    pub fn current(&self) -> Duration {
        let ms = self.current_ms();
        if ms.is_finite() && ms > 0.0 {
            Duration::from_micros((ms * 1000.0).round() as u64)
        } else {
            Duration::ZERO
        }
    }

    fn base(&self) -> f64 {
        self.current_ms.unwrap_or(self.config.seed_ms as f64)
    }
}
