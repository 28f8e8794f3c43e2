//! Transport-level and feed-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during a single network operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The endpoint answered HTTP 429: caller should back off.
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The socket was closed by the peer.
    #[error("Connection closed")]
    Closed,

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the endpoint signalled rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` if the same request may succeed later: network,
    /// timeout, rate-limit and closed-socket failures. Node-reported RPC
    /// errors and undecodable responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::WebSocket(_)
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Closed
        )
    }
}

/// Errors surfaced by the feed pipeline.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The node reports a different chain than the one configured.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    /// An RPC call succeeded but its result was absent or unusable.
    #[error("Malformed result for {method}: {reason}")]
    MalformedResult { method: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The background task has shut down.
    #[error("Feed client closed")]
    ClientClosed,
}

impl FeedError {
    pub fn malformed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResult {
            method: method.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_detected() {
        let err = TransportError::RateLimited {
            endpoint: "https://rpc.example".into(),
        };
        assert!(err.is_rate_limited());
        assert!(err.is_retryable());
        assert!(!TransportError::Timeout { ms: 5_000 }.is_rate_limited());
        assert!(TransportError::Timeout { ms: 5_000 }.is_retryable());
        assert!(TransportError::Closed.is_retryable());
    }

    #[test]
    fn rpc_error_message() {
        let err = TransportError::Rpc(JsonRpcError {
            code: -32601,
            message: "method not found".into(),
            data: None,
        });
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "RPC error -32601: method not found");
    }

    #[test]
    fn chain_id_mismatch_message() {
        let err = FeedError::ChainIdMismatch {
            expected: 41454,
            actual: 1,
        };
        assert!(err.to_string().contains("expected 41454"));
    }
}
