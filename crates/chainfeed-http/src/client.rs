//! HTTP JSON-RPC client backed by `reqwest`.

use std::time::Duration;

use reqwest::StatusCode;

use chainfeed_core::error::TransportError;
use chainfeed_core::request::{JsonRpcRequest, JsonRpcResponse};

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Transport-level deadline. The feed applies its own shorter per-kind
    /// timeouts on top of this.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("chainfeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Stateless JSON-RPC POST client. The endpoint is given per call.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpRpcClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            http,
            request_timeout: config.request_timeout,
        })
    }

    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(HttpClientConfig::default())
    }

    /// POST one request. HTTP 429 comes back as [`TransportError::RateLimited`].
    pub async fn post(
        &self,
        url: &str,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = status_error(status, url, &body);
            tracing::debug!(method = %req.method, %status, error = %err, "rpc request rejected");
            return Err(err);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(serde_json::from_slice::<JsonRpcResponse>(&bytes)?)
    }
}

/// Map a non-success status to a transport error.
pub fn status_error(status: StatusCode, url: &str, body: &str) -> TransportError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        TransportError::RateLimited {
            endpoint: url.to_string(),
        }
    } else {
        TransportError::Http(format!("HTTP {}: {body}", status.as_u16()))
    }
}
