//! Pre-connect reachability probe.
//!
//! Runs over HTTP before every socket open. A failed probe is terminal for
//! the current connect request: the client goes straight to `Failed`.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use chainfeed_core::error::{FeedError, TransportError};
use chainfeed_core::request::JsonRpcRequest;
use chainfeed_core::transport::Transport;
use chainfeed_core::{units, FeedConfig};

use crate::fetch::request_id;

/// What the probe learned about the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    /// Reported chain id; `None` when verification is disabled.
    pub chain_id: Option<u64>,
    pub head_block: u64,
    pub latency_ms: u64,
}

/// Check the RPC endpoint: chain id (when enabled), then head block number.
pub async fn probe(transport: &dyn Transport, config: &FeedConfig) -> Result<ProbeReport, FeedError> {
    let deadline = Duration::from_millis(config.tuning.probe_timeout_ms);
    let started = tokio::time::Instant::now();

    let report = tokio::time::timeout(deadline, async {
        let chain_id = if config.tuning.verify_chain_id {
            let actual = hex_quantity(transport, &config.rpc_url, "eth_chainId").await?;
            if actual != config.chain_id {
                return Err(FeedError::ChainIdMismatch {
                    expected: config.chain_id,
                    actual,
                });
            }
            Some(actual)
        } else {
            None
        };
        let head_block = hex_quantity(transport, &config.rpc_url, "eth_blockNumber").await?;
        Ok(ProbeReport {
            chain_id,
            head_block,
            latency_ms: 0,
        })
    })
    .await
    .map_err(|_| TransportError::Timeout {
        ms: config.tuning.probe_timeout_ms,
    })??;

    Ok(ProbeReport {
        latency_ms: started.elapsed().as_millis() as u64,
        ..report
    })
}

async fn hex_quantity(transport: &dyn Transport, url: &str, method: &str) -> Result<u64, FeedError> {
    let resp = transport
        .http_post(url, JsonRpcRequest::new(request_id(), method, vec![]))
        .await?;
    let result = resp.into_result().map_err(TransportError::Rpc)?;
    match result.as_str() {
        Some(s) if units::is_hex_string(s) => Ok(units::parse_hex_u64(Some(s))),
        _ => Err(FeedError::malformed(method, format!("expected hex quantity, got {result}"))),
    }
}
