//! chainfeed-core: foundation traits and types for ChainFeed.
//!
//! # Overview
//!
//! ChainFeed turns a live chain-node subscription into a classified,
//! rate-annotated event feed for visual consumers. The core crate defines:
//!
//! - [`BlockRecord`] / [`TransactionRecord`] / [`ClassifiedTransaction`]: the data model
//! - [`Transport`] / [`FeedSocket`]: injected network capabilities
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`] / [`FeedError`]: structured error types
//! - [`FeedConfig`]: construction-time configuration
//! - [`FeedEvent`]: typed events delivered to consumers
//! - [`policy`] module: reconnect backoff and adaptive request delay

pub mod config;
pub mod error;
pub mod event;
pub mod policy;
pub mod request;
pub mod transport;
pub mod types;
pub mod units;

pub use config::{FeedConfig, StreamTuning};
pub use error::{FeedError, TransportError};
pub use event::FeedEvent;
pub use request::{JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::{FeedSocket, Transport};
pub use types::{
    BlockRecord, BlockSource, Category, ClassificationResult, ClassifiedTransaction,
    ConnectionState, TransactionRecord,
};
