//! Sliding-window transactions-per-second estimator.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(1_000);
const DECAY: f64 = 0.9;

/// Counts events in the trailing second.
///
/// The reported rate is `max(count_in_window, previous_rate * 0.9)`, so a
/// readout taken between bursts decays smoothly instead of dropping to zero.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    /// Event timestamps, oldest first.
    window: VecDeque<Instant>,
    capacity: usize,
    rate: f64,
}

impl ThroughputEstimator {
    /// `capacity` bounds the window (the configured max TPS); at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            rate: 0.0,
        }
    }

    pub fn record_event(&mut self) {
        self.record_event_at(Instant::now());
    }

    pub fn record_event_at(&mut self, now: Instant) {
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(now);
        self.update(now);
    }

    pub fn current_rate(&mut self) -> f64 {
        self.current_rate_at(Instant::now())
    }

    pub fn current_rate_at(&mut self, now: Instant) -> f64 {
        self.update(now);
        self.rate
    }

    /// Events currently inside the window (as of the last update).
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.rate = 0.0;
    }

    fn update(&mut self, now: Instant) {
        while let Some(&oldest) = self.window.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
        let raw = self.window.len() as f64;
        self.rate = raw.max(self.rate * DECAY);
    }
}
