//! Typed events delivered to feed consumers.

use serde::Serialize;

use crate::types::{BlockRecord, ClassifiedTransaction, ConnectionState};

/// Everything the feed tells the outside world.
///
/// Consumers receive these over a broadcast channel; a consumer that falls
/// behind loses the oldest events rather than slowing the feed down.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum FeedEvent {
    /// A block was resolved (from its body or, on fallback, its header).
    NewBlock(BlockRecord),
    /// A transaction was resolved and classified.
    NewTransaction(ClassifiedTransaction),
    /// No further data will arrive without an explicit reconnect.
    ConnectionFailed { reason: String },
    /// The connection state machine moved along an edge.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl FeedEvent {
    /// Short name used in logs (`"newBlock"` etc).
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => "newBlock",
            Self::NewTransaction(_) => "newTransaction",
            Self::ConnectionFailed { .. } => "connectionFailed",
            Self::StateChanged { .. } => "stateChanged",
        }
    }
}
