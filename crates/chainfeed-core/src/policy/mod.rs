//! Delay policies for the feed client.
//!
//! ```text
//! socket closed  → [ReconnectBackoff] → next connect attempt (or Failed)
//! fetch result   → [AdaptiveDelay]    → wait before the next fetch of that kind
//! ```

pub mod adaptive_delay;
pub mod backoff;

pub use adaptive_delay::{AdaptiveDelay, AdaptiveDelayConfig, DelaySignal};
pub use backoff::{BackoffConfig, ReconnectBackoff};
