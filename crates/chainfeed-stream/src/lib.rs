//! chainfeed-stream: live chain subscription client.
//!
//! [`ChainStreamClient`] is a cheap, cloneable handle to one background task.
//! The task owns the connection state machine, the subscription socket, the
//! in-flight fetches and the analytics, and is the only thing that mutates
//! them:
//!
//! ```text
//! socket frame ──► dispatch ──► fetch (delay + timeout) ──► classify
//!                                                            │
//!                         weights ◄── throughput ◄───────────┘
//!                                                            ▼
//!                                        broadcast<FeedEvent> / watch<FeedStats>
//! ```

pub mod client;
pub mod dispatch;
pub mod fetch;
pub mod probe;
pub mod stats;
mod worker;

pub use client::ChainStreamClient;
pub use dispatch::{parse_frame, Frame};
pub use probe::{probe, ProbeReport};
pub use stats::FeedStats;
