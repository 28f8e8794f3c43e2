//! chainfeed-analytics: per-transaction analytics for ChainFeed.
//!
//! - [`TransactionClassifier`]: selector-table categorisation with running counts
//! - [`ThroughputEstimator`]: one-second sliding window with decaying rate
//! - [`CategoryWeightEngine`]: adaptive per-category weights and drop hints
//!
//! All three are plain single-owner structs; the stream client owns one of
//! each and drives them from its event loop.

pub mod classifier;
pub mod selectors;
pub mod throughput;
pub mod weights;

pub use classifier::{categorize, CategoryCounts, TransactionClassifier};
pub use throughput::ThroughputEstimator;
pub use weights::{CategoryWeightEngine, WeightStats};
