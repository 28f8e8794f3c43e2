//! chainfeed-http: JSON-RPC over HTTP POST.
//!
//! One request per call, no retries: the feed's adaptive delay is the only
//! backoff applied to the fetch path, and it needs to see every 429.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
