//! Read-only feed statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use chainfeed_analytics::CategoryCounts;
use chainfeed_core::{Category, ConnectionState};

/// Weight of the running value in the block-time average; each new sample
/// contributes `1 / BLOCK_TIME_SMOOTHING`.
pub const BLOCK_TIME_SMOOTHING: f64 = 10.0;

/// Snapshot published by the client task after every processed notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub state: ConnectionState,
    pub blocks_received: u64,
    pub transactions_received: u64,
    pub last_block_number: Option<u64>,
    pub average_block_time_ms: f64,
    pub current_tps: f64,
    /// Reconnect attempts consumed since the last successful open.
    pub reconnect_attempts: u32,
    pub category_counts: CategoryCounts,
    pub category_percentages: BTreeMap<Category, u32>,
    pub weights: BTreeMap<Category, f64>,
    pub most_active: Category,
    pub block_delay_ms: f64,
    pub tx_delay_ms: f64,
    pub in_flight_fetches: usize,
    /// Notifications dropped because the in-flight limit was reached.
    pub dropped_notifications: u64,
}

impl FeedStats {
    pub fn initial(block_time_ms: u64) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            blocks_received: 0,
            transactions_received: 0,
            last_block_number: None,
            average_block_time_ms: block_time_ms as f64,
            current_tps: 0.0,
            reconnect_attempts: 0,
            category_counts: Category::ALL.into_iter().map(|c| (c, 0)).collect(),
            category_percentages: BTreeMap::new(),
            weights: Category::ALL.into_iter().map(|c| (c, 1.0)).collect(),
            most_active: Category::Other,
            block_delay_ms: 0.0,
            tx_delay_ms: 0.0,
            in_flight_fetches: 0,
            dropped_notifications: 0,
        }
    }
}

/// Exponential moving average of block times, starting from the configured
/// block time: `avg = (avg * 9 + sample) / 10`.
#[derive(Debug, Clone)]
pub struct BlockTimeAverage {
    current: f64,
}

impl BlockTimeAverage {
    pub fn new(seed_ms: u64) -> Self {
        Self {
            current: seed_ms as f64,
        }
    }

    pub fn push(&mut self, block_time_ms: u64) {
        self.current =
            (self.current * (BLOCK_TIME_SMOOTHING - 1.0) + block_time_ms as f64) / BLOCK_TIME_SMOOTHING;
    }

    pub fn average(&self) -> f64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_seed_and_moves_a_tenth_per_sample() {
        let mut avg = BlockTimeAverage::new(500);
        assert_eq!(avg.average(), 500.0);
        avg.push(400);
        assert!((avg.average() - 490.0).abs() < 1e-9);
        avg.push(1_490);
        assert!((avg.average() - 590.0).abs() < 1e-9);
    }

    #[test]
    fn converges_on_a_steady_block_time() {
        let mut avg = BlockTimeAverage::new(500);
        for _ in 0..200 {
            avg.push(1_000);
        }
        assert!((avg.average() - 1_000.0).abs() < 0.01);
    }

    #[test]
    fn initial_snapshot_serializes() {
        let stats = FeedStats::initial(500);
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["state"], "disconnected");
        assert_eq!(v["averageBlockTimeMs"], 500.0);
        assert_eq!(v["weights"]["contractCall"], 1.0);
    }
}
