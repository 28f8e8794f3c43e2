//! chainfeed-ws: text-framed WebSocket for JSON-RPC subscriptions.
//!
//! [`WsSocket`] implements [`chainfeed_core::FeedSocket`]. It does no
//! reconnecting or request bookkeeping of its own; the stream client owns
//! the connection lifecycle.

pub mod socket;

pub use socket::WsSocket;
