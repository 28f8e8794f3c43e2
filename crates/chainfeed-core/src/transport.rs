//! Injected network capabilities.
//!
//! The stream client never constructs sockets or HTTP clients itself; it asks
//! a [`Transport`] for them. Production code composes `chainfeed-http` and
//! `chainfeed-ws`; tests plug in scripted fakes.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// An open, text-framed WebSocket connection.
#[async_trait]
pub trait FeedSocket: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Returns `None` once the connection is closed. Control frames are
    /// handled by the implementation and never surface here.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}

/// The capability set the stream client needs from the network.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so the client task can share them
/// with in-flight fetch futures through an `Arc`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a WebSocket connection to `url`.
    async fn open_socket(&self, url: &str) -> Result<Box<dyn FeedSocket>, TransportError>;

    /// POST a JSON-RPC request to `url`.
    ///
    /// HTTP 429 must be reported as [`TransportError::RateLimited`]; every other
    /// non-success status as [`TransportError::Http`].
    async fn http_post(
        &self,
        url: &str,
        req: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError>;
}
