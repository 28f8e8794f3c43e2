//! Feed configuration.
//!
//! Supplied once at construction and never mutated by the client.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::policy::{AdaptiveDelayConfig, BackoffConfig};

/// Connection and chain parameters for one feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    /// HTTP JSON-RPC endpoint, e.g. "https://testnet-rpc.monad.xyz"
    pub rpc_url: String,
    /// WebSocket endpoint, e.g. "wss://testnet-rpc.monad.xyz"
    pub ws_url: String,
    /// Expected chain id, checked by the connection probe.
    pub chain_id: u64,
    /// Nominal block time; seeds the moving block-time average.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,
    /// Upper bound on tracked transactions per second.
    #[serde(default = "default_max_tps")]
    pub max_tps: u32,
    /// Symbol attached to native values (e.g. "MON").
    #[serde(default = "default_native_token")]
    pub native_token: String,
    #[serde(default)]
    pub tuning: StreamTuning,
}

fn default_block_time_ms() -> u64 { 500 }
fn default_max_tps() -> u32 { 10_000 }
fn default_native_token() -> String { "MON".into() }

/// Timeouts, budgets and channel sizes for the stream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTuning {
    #[serde(default)]
    pub reconnect: BackoffConfig,
    #[serde(default = "AdaptiveDelayConfig::block_fetch")]
    pub block_delay: AdaptiveDelayConfig,
    #[serde(default = "AdaptiveDelayConfig::transaction_fetch")]
    pub tx_delay: AdaptiveDelayConfig,
    #[serde(default = "default_block_fetch_timeout_ms")]
    pub block_fetch_timeout_ms: u64,
    #[serde(default = "default_tx_fetch_timeout_ms")]
    pub tx_fetch_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// `eth_subscribe` kinds issued on every socket open.
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,
    /// Check `eth_chainId` against `chain_id` during the probe.
    #[serde(default = "bool_true")]
    pub verify_chain_id: bool,
    /// Broadcast channel capacity for feed events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Notifications arriving while this many fetches are in flight are dropped.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_fetches: usize,
}

fn default_block_fetch_timeout_ms() -> u64 { 3_000 }
fn default_tx_fetch_timeout_ms() -> u64 { 5_000 }
fn default_probe_timeout_ms() -> u64 { 10_000 }
fn default_subscriptions() -> Vec<String> { vec!["newHeads".into()] }
fn bool_true() -> bool { true }
fn default_event_capacity() -> usize { 1_024 }
fn default_max_in_flight() -> usize { 64 }

impl Default for StreamTuning {
    fn default() -> Self {
        Self {
            reconnect: BackoffConfig::default(),
            block_delay: AdaptiveDelayConfig::block_fetch(),
            tx_delay: AdaptiveDelayConfig::transaction_fetch(),
            block_fetch_timeout_ms: default_block_fetch_timeout_ms(),
            tx_fetch_timeout_ms: default_tx_fetch_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            subscriptions: default_subscriptions(),
            verify_chain_id: true,
            event_capacity: default_event_capacity(),
            max_in_flight_fetches: default_max_in_flight(),
        }
    }
}

impl FeedConfig {
    /// Create a config with default tuning.
    pub fn new(rpc_url: impl Into<String>, ws_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ws_url: ws_url.into(),
            chain_id,
            block_time_ms: default_block_time_ms(),
            max_tps: default_max_tps(),
            native_token: default_native_token(),
            tuning: StreamTuning::default(),
        }
    }

    /// Public Monad testnet endpoints.
    pub fn monad_testnet() -> Self {
        Self::new(
            "https://testnet-rpc.monad.xyz",
            "wss://testnet-rpc.monad.xyz",
            41454,
        )
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FeedError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| FeedError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<(), FeedError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(FeedError::Config(format!(
                "rpcUrl must be http(s): {}",
                self.rpc_url
            )));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(FeedError::Config(format!(
                "wsUrl must be ws(s): {}",
                self.ws_url
            )));
        }
        if self.max_tps == 0 {
            return Err(FeedError::Config("maxTps must be at least 1".into()));
        }
        if self.tuning.event_capacity == 0 {
            return Err(FeedError::Config("eventCapacity must be at least 1".into()));
        }
        if self.tuning.max_in_flight_fetches == 0 {
            return Err(FeedError::Config("maxInFlightFetches must be at least 1".into()));
        }
        if self.tuning.reconnect.max_attempts == 0 {
            return Err(FeedError::Config("reconnect.maxAttempts must be at least 1".into()));
        }
        let backoff = &self.tuning.reconnect;
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(FeedError::Config(
                "reconnect.multiplier must be a finite number >= 1".into(),
            ));
        }
        self.tuning
            .block_delay
            .validate("blockDelay")
            .and_then(|()| self.tuning.tx_delay.validate("txDelay"))
            .map_err(FeedError::Config)?;
        if self.tuning.subscriptions.is_empty() {
            return Err(FeedError::Config("at least one subscription kind is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = FeedConfig::monad_testnet();
        assert!(config.validate().is_ok());
        assert_eq!(config.tuning.reconnect.max_attempts, 5);
        assert_eq!(config.tuning.reconnect.base_delay_ms, 1_000);
        assert_eq!(config.tuning.block_fetch_timeout_ms, 3_000);
        assert_eq!(config.tuning.tx_fetch_timeout_ms, 5_000);
        assert_eq!(config.tuning.block_delay.cap_ms, 3_000);
        assert_eq!(config.tuning.tx_delay.cap_ms, 2_000);
        assert_eq!(config.tuning.subscriptions, vec!["newHeads".to_string()]);
    }

    #[test]
    fn yaml_with_partial_tuning() {
        let yaml = r#"
rpcUrl: https://rpc.example
wsUrl: wss://rpc.example
chainId: 1
nativeToken: ETH
tuning:
  subscriptions: [newHeads, newPendingTransactions]
  reconnect:
    maxAttempts: 3
"#;
        let config = FeedConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.native_token, "ETH");
        assert_eq!(config.max_tps, 10_000);
        assert_eq!(config.tuning.subscriptions.len(), 2);
        assert_eq!(config.tuning.reconnect.max_attempts, 3);
        assert_eq!(config.tuning.reconnect.base_delay_ms, 1_000);
        assert!(config.tuning.verify_chain_id);
    }

    #[test]
    fn rejects_bad_urls() {
        let mut config = FeedConfig::monad_testnet();
        config.ws_url = "https://not-a-socket".into();
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));

        let mut config = FeedConfig::monad_testnet();
        config.rpc_url = "ftp://nope".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_increase_factor_from_yaml() {
        let yaml = r#"
rpcUrl: https://rpc.example
wsUrl: wss://rpc.example
chainId: 1
tuning:
  txDelay:
    seedMs: 100
    floorMs: 100
    capMs: 2000
    increaseFactor: -2.0
"#;
        let err = FeedConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("txDelay.increaseFactor"), "{err}");
    }

    #[test]
    fn rejects_bad_delay_bounds_and_factors() {
        let mut config = FeedConfig::monad_testnet();
        config.tuning.block_delay.floor_ms = 4_000;
        assert!(config.validate().unwrap_err().to_string().contains("blockDelay.floorMs"));

        let mut config = FeedConfig::monad_testnet();
        config.tuning.block_delay.decay_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::monad_testnet();
        config.tuning.tx_delay.decay_factor = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::monad_testnet();
        config.tuning.tx_delay.increase_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_shrinking_reconnect_multiplier() {
        let mut config = FeedConfig::monad_testnet();
        config.tuning.reconnect.multiplier = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_tps() {
        let mut config = FeedConfig::monad_testnet();
        config.max_tps = 0;
        assert!(config.validate().is_err());
    }
}
