//! Adaptive per-category weights.
//!
//! Recent classified transactions go into a fixed-size ring buffer. Every
//! few seconds the weights are recomputed from the buffer entries inside a
//! trailing window: `weight = max(0.1, 1 + 3 * share)`. Renderers turn the
//! weights into drop-count hints.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use chainfeed_core::Category;

pub const RING_CAPACITY: usize = 100;
pub const RECOMPUTE_INTERVAL: Duration = Duration::from_millis(5_000);
pub const FREQUENCY_WINDOW: Duration = Duration::from_secs(30);

const MIN_WEIGHT: f64 = 0.1;
const FREQUENCY_GAIN: f64 = 3.0;

/// Snapshot of the engine for stats publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightStats {
    pub total_transactions: u64,
    pub buffer_len: usize,
    pub most_active: Category,
    pub most_active_weight: f64,
    pub weights: BTreeMap<Category, f64>,
}

#[derive(Debug, Clone, Copy)]
struct RecentEntry {
    category: Category,
    at: Instant,
}

/// Maintains the category weights.
#[derive(Debug, Clone)]
pub struct CategoryWeightEngine {
    weights: [f64; Category::ALL.len()],
    recent: VecDeque<RecentEntry>,
    total: u64,
    last_recompute: Instant,
}

impl Default for CategoryWeightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryWeightEngine {
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    /// Start the recompute timer at `now`.
    pub fn new_at(now: Instant) -> Self {
        Self {
            weights: [1.0; Category::ALL.len()],
            recent: VecDeque::with_capacity(RING_CAPACITY),
            total: 0,
            last_recompute: now,
        }
    }

    pub fn add_transaction(&mut self, category: Category) {
        self.add_transaction_at(category, Instant::now());
    }

    /// Record one classified transaction; recomputes if the interval elapsed.
    pub fn add_transaction_at(&mut self, category: Category, now: Instant) {
        if self.recent.len() >= RING_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(RecentEntry { category, at: now });
        self.total += 1;

        if now.saturating_duration_since(self.last_recompute) > RECOMPUTE_INTERVAL {
            self.recompute_at(now);
        }
    }

    pub fn recompute(&mut self) {
        self.recompute_at(Instant::now());
    }

    /// Recompute weights from buffer entries inside the trailing window.
    /// An empty window leaves the weights as they were.
    pub fn recompute_at(&mut self, now: Instant) {
        self.last_recompute = now;

        let mut counts = [0u64; Category::ALL.len()];
        let mut in_window = 0u64;
        for entry in &self.recent {
            if now.saturating_duration_since(entry.at) < FREQUENCY_WINDOW {
                counts[entry.category.index()] += 1;
                in_window += 1;
            }
        }
        if in_window == 0 {
            return;
        }

        for c in Category::ALL {
            let share = counts[c.index()] as f64 / in_window as f64;
            self.weights[c.index()] = (1.0 + share * FREQUENCY_GAIN).max(MIN_WEIGHT);
        }
        tracing::debug!(in_window, weights = ?self.weights, "category weights recomputed");
    }

    /// Current weight, always ≥ 0.1.
    pub fn weight(&self, category: Category) -> f64 {
        self.weights[category.index()]
    }

    /// Drops to spawn per transaction of `category`: 1, 2 or 3.
    pub fn drop_count(&self, category: Category) -> u8 {
        let w = self.weight(category);
        if w > 2.5 {
            3
        } else if w > 1.8 {
            2
        } else {
            1
        }
    }

    /// Probability of an extra drop, proportional to weight and capped at 1.
    pub fn extra_drop_chance(&self, category: Category) -> f64 {
        (0.3 * self.weight(category)).min(1.0)
    }

    pub fn all_weights(&self) -> BTreeMap<Category, f64> {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.weights[c.index()]))
            .collect()
    }

    /// Highest-weighted category; ties go to the earlier category.
    pub fn most_active_category(&self) -> (Category, f64) {
        let mut best = (Category::Other, 0.0);
        for c in Category::ALL {
            let w = self.weights[c.index()];
            if w > best.1 {
                best = (c, w);
            }
        }
        best
    }

    pub fn buffer_len(&self) -> usize {
        self.recent.len()
    }

    pub fn stats(&self) -> WeightStats {
        let (most_active, most_active_weight) = self.most_active_category();
        WeightStats {
            total_transactions: self.total,
            buffer_len: self.recent.len(),
            most_active,
            most_active_weight,
            weights: self.all_weights(),
        }
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        *self = Self::new_at(now);
    }
}
