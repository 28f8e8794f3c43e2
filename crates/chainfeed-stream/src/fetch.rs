//! Block and transaction fetches.
//!
//! Each fetch is a self-contained `'static` future: wait out the kind's
//! adaptive delay, issue one HTTP request under a deadline, and report the
//! result together with the signal for the delay controller. The client task
//! polls these from a `FuturesUnordered`; dropping the set cancels them.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use chainfeed_core::error::{FeedError, TransportError};
use chainfeed_core::policy::DelaySignal;
use chainfeed_core::request::JsonRpcRequest;
use chainfeed_core::transport::Transport;

/// What to fetch.
#[derive(Debug, Clone)]
pub enum FetchJob {
    /// Full body for a subscription header, with the locally measured block time.
    Block { header: Value, block_time: u64 },
    Transaction { hash: String },
}

impl FetchJob {
    pub fn kind(&self) -> FetchKind {
        match self {
            Self::Block { .. } => FetchKind::Block,
            Self::Transaction { .. } => FetchKind::Transaction,
        }
    }

    /// Request for this job. Headers without a hash are fetched by number.
    pub fn request(&self, id: u64) -> JsonRpcRequest {
        match self {
            Self::Block { header, .. } => match header.get("hash").and_then(Value::as_str) {
                Some(hash) => JsonRpcRequest::new(
                    id,
                    "eth_getBlockByHash",
                    vec![Value::String(hash.to_string()), Value::Bool(true)],
                ),
                None => JsonRpcRequest::new(
                    id,
                    "eth_getBlockByNumber",
                    vec![header.get("number").cloned().unwrap_or(Value::Null), Value::Bool(true)],
                ),
            },
            Self::Transaction { hash } => JsonRpcRequest::new(
                id,
                "eth_getTransactionByHash",
                vec![Value::String(hash.clone())],
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Block,
    Transaction,
}

/// A finished fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub job: FetchJob,
    /// The `result` member; a `null` result is reported as malformed.
    pub result: Result<Value, FeedError>,
    pub signal: DelaySignal,
}

/// Build the future for one fetch.
pub fn start(
    transport: Arc<dyn Transport>,
    url: String,
    job: FetchJob,
    delay: Duration,
    deadline: Duration,
) -> BoxFuture<'static, FetchOutcome> {
    async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let req = job.request(request_id());
        let method = req.method.clone();

        let (result, signal) =
            match tokio::time::timeout(deadline, transport.http_post(&url, req)).await {
                Err(_) => (
                    Err(TransportError::Timeout {
                        ms: deadline.as_millis() as u64,
                    }
                    .into()),
                    DelaySignal::Neutral,
                ),
                Ok(Err(e)) if e.is_rate_limited() => (Err(e.into()), DelaySignal::RateLimited),
                Ok(Err(e)) => (Err(e.into()), DelaySignal::Neutral),
                Ok(Ok(resp)) => {
                    let result = match resp.into_result() {
                        Ok(Value::Null) => Err(FeedError::malformed(&method, "null result")),
                        Ok(v) => Ok(v),
                        Err(rpc) => Err(TransportError::Rpc(rpc).into()),
                    };
                    (result, DelaySignal::Success)
                }
            };

        FetchOutcome {
            job,
            result,
            signal,
        }
    }
    .boxed()
}

/// Random request id for HTTP calls, within the JSON safe-integer range.
pub fn request_id() -> u64 {
    rand::random::<u64>() >> 11
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_by_hash_when_header_has_hash() {
        let job = FetchJob::Block {
            header: json!({"number": "0x10", "hash": "0xbeef"}),
            block_time: 0,
        };
        let req = job.request(1);
        assert_eq!(req.method, "eth_getBlockByHash");
        assert_eq!(req.params, vec![json!("0xbeef"), json!(true)]);
        assert_eq!(job.kind(), FetchKind::Block);
    }

    #[test]
    fn block_by_number_without_hash() {
        let job = FetchJob::Block {
            header: json!({"number": "0x10"}),
            block_time: 0,
        };
        let req = job.request(1);
        assert_eq!(req.method, "eth_getBlockByNumber");
        assert_eq!(req.params[0], "0x10");
    }

    #[test]
    fn transaction_by_hash() {
        let job = FetchJob::Transaction { hash: "0xfeed".into() };
        let req = job.request(9);
        assert_eq!(req.method, "eth_getTransactionByHash");
        assert_eq!(req.params, vec![json!("0xfeed")]);
    }
}
