//! Data model shared by every ChainFeed crate.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;
use crate::units;

// ─── Connection state ─────────────────────────────────────────────────────────

/// Lifecycle of the node subscription.
///
/// State transitions:
/// - `Disconnected` → `Connecting`:   connect requested
/// - `Connecting` → `Connected`:      probe passed and socket opened
/// - `Connecting` → `Reconnecting`:   socket open failed, attempts remain
/// - `Connected` → `Reconnecting`:    socket closed or errored
/// - `Reconnecting` → `Connecting`:   backoff delay elapsed
/// - `Connecting`/`Reconnecting` → `Failed`: probe failed or attempts exhausted
/// - `Failed` → `Connecting`:         explicit reconnect request
/// - any active state → `Disconnected`: explicit disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// Returns `true` if `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connecting, Failed)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Connected, Disconnected)
                | (Reconnecting, Connecting)
                | (Reconnecting, Failed)
                | (Reconnecting, Disconnected)
                | (Failed, Connecting)
                | (Failed, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ─── Categories ───────────────────────────────────────────────────────────────

/// Semantic category assigned to every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Defi,
    Nft,
    Transfer,
    ContractCall,
    ContractDeploy,
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 6] = [
        Category::Defi,
        Category::Nft,
        Category::Transfer,
        Category::ContractCall,
        Category::ContractDeploy,
        Category::Other,
    ];

    /// Stable wire name (`"contractCall"` etc).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Defi => "defi",
            Self::Nft => "nft",
            Self::Transfer => "transfer",
            Self::ContractCall => "contractCall",
            Self::ContractDeploy => "contractDeploy",
            Self::Other => "other",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Defi => "DeFi",
            Self::Nft => "NFT",
            Self::Transfer => "Transfer",
            Self::ContractCall => "Contract Call",
            Self::ContractDeploy => "Contract Deploy",
            Self::Other => "Other",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Defi => "#00D4AA",
            Self::Nft => "#FF6B6B",
            Self::Transfer => "#4ECDC4",
            Self::ContractCall => "#45B7D1",
            Self::ContractDeploy => "#96CEB4",
            Self::Other => "#FECA57",
        }
    }

    /// Image the renderer uses for this category's drops.
    pub fn drop_image(self) -> &'static str {
        match self {
            Self::Defi => "/drops/defi.png",
            Self::Nft => "/drops/nft.png",
            Self::Transfer => "/drops/transfer.png",
            Self::ContractCall => "/drops/contract-call.png",
            Self::ContractDeploy => "/drops/contract-deploy.png",
            Self::Other => "/drops/other.png",
        }
    }

    /// Position in [`Category::ALL`], for array-indexed tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Display metadata attached to a classified transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: Category,
    pub category_display: &'static str,
    pub color: &'static str,
    pub drop_image: &'static str,
}

impl From<Category> for ClassificationResult {
    fn from(category: Category) -> Self {
        Self {
            category,
            category_display: category.display_name(),
            color: category.color(),
            drop_image: category.drop_image(),
        }
    }
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

/// Where a [`BlockRecord`]'s fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockSource {
    /// Built from the fetched block body.
    FullBody,
    /// Built from the subscription header alone (fetch failed or timed out).
    HeaderOnly,
}

/// A resolved block, emitted once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub number: u64,
    pub hash: Option<String>,
    /// Chain timestamp in milliseconds.
    pub timestamp: u64,
    pub transaction_count: usize,
    pub gas_used: u64,
    pub gas_limit: u64,
    /// `gas_used / gas_limit` as a percentage.
    pub network_utilization: f64,
    pub base_fee_per_gas: u64,
    pub miner: Option<String>,
    pub size: u64,
    /// Local milliseconds since the previous block notification.
    pub block_time: u64,
    pub source: BlockSource,
}

impl BlockRecord {
    /// Build a record from a header or full block JSON object.
    ///
    /// Only `number` is mandatory; every other field defaults to zero/absent.
    pub fn from_json(block: &Value, source: BlockSource, block_time: u64) -> Result<Self, FeedError> {
        let number = block
            .get("number")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::malformed("block", "missing number"))?;

        let gas_used = units::parse_hex_u64(block.get("gasUsed").and_then(Value::as_str));
        let gas_limit = units::parse_hex_u64(block.get("gasLimit").and_then(Value::as_str));

        Ok(Self {
            number: units::parse_hex_u64(Some(number)),
            hash: block.get("hash").and_then(Value::as_str).map(String::from),
            timestamp: units::parse_hex_u64(block.get("timestamp").and_then(Value::as_str))
                .saturating_mul(1000),
            transaction_count: block
                .get("transactions")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            gas_used,
            gas_limit,
            network_utilization: utilization(gas_used, gas_limit),
            base_fee_per_gas: units::parse_hex_u64(
                block.get("baseFeePerGas").and_then(Value::as_str),
            ),
            miner: block.get("miner").and_then(Value::as_str).map(String::from),
            size: units::parse_hex_u64(block.get("size").and_then(Value::as_str)),
            block_time,
            source,
        })
    }
}

fn utilization(gas_used: u64, gas_limit: u64) -> f64 {
    if gas_limit == 0 {
        0.0
    } else {
        gas_used as f64 / gas_limit as f64 * 100.0
    }
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// A transaction resolved from the node, with values already converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    pub from: Option<String>,
    /// `None` for contract creation.
    pub to: Option<String>,
    /// Native-token value, six fraction digits.
    pub value: String,
    /// Exact value in wei.
    pub value_wei: U256,
    /// Gas price in gwei.
    pub gas_price: f64,
    pub gas_limit: u64,
    pub block_number: u64,
    /// Calldata; `None` when the node omitted it.
    pub input: Option<String>,
    pub nonce: u64,
    pub token: String,
    /// Local wall-clock milliseconds when the record was built.
    pub seen_at: u64,
}

impl TransactionRecord {
    /// Build a record from an `eth_getTransactionByHash` result or an element
    /// of a full block's `transactions` array.
    pub fn from_json(tx: &Value, token: &str) -> Result<Self, FeedError> {
        let hash = tx
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::malformed("transaction", "missing hash"))?;
        let text = |key: &str| tx.get(key).and_then(Value::as_str);

        let value_wei = units::parse_hex_u256(text("value"));
        // EIP-1559 transactions may omit gasPrice in some node versions
        let gas_price_wei = units::parse_hex_u128(text("gasPrice").or_else(|| text("maxFeePerGas")));

        Ok(Self {
            hash: hash.to_string(),
            from: text("from").map(String::from),
            to: text("to").map(String::from),
            value: units::wei_to_native(value_wei),
            value_wei,
            gas_price: units::wei_to_gwei(gas_price_wei),
            gas_limit: units::parse_hex_u64(text("gas")),
            block_number: units::parse_hex_u64(text("blockNumber")),
            input: text("input").map(String::from),
            nonce: units::parse_hex_u64(text("nonce")),
            token: token.to_string(),
            seen_at: units::now_millis(),
        })
    }

    /// Returns `true` if the transaction moves a non-zero native amount.
    pub fn has_value(&self) -> bool {
        !self.value_wei.is_zero()
    }
}

/// A transaction together with its classification, as emitted to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub tx: TransactionRecord,
    #[serde(flatten)]
    pub classification: ClassificationResult,
}

impl ClassifiedTransaction {
    pub fn category(&self) -> Category {
        self.classification.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_machine_edges() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Connecting));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Connected));
        assert!(!Reconnecting.can_transition_to(Connected));
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
            assert_eq!(Category::ALL[c.index()], c);
        }
        assert!("lending".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_camel_case() {
        let json = serde_json::to_string(&Category::ContractDeploy).unwrap();
        assert_eq!(json, "\"contractDeploy\"");
    }

    #[test]
    fn block_from_full_body() {
        let block = json!({
            "number": "0x10",
            "hash": "0xabc",
            "timestamp": "0x65",
            "gasUsed": "0x5",
            "gasLimit": "0xa",
            "baseFeePerGas": "0x3b9aca00",
            "miner": "0xminer",
            "size": "0x200",
            "transactions": [{"hash": "0x1"}, {"hash": "0x2"}]
        });
        let rec = BlockRecord::from_json(&block, BlockSource::FullBody, 480).unwrap();
        assert_eq!(rec.number, 16);
        assert_eq!(rec.timestamp, 101_000);
        assert_eq!(rec.transaction_count, 2);
        assert_eq!(rec.network_utilization, 50.0);
        assert_eq!(rec.base_fee_per_gas, 1_000_000_000);
        assert_eq!(rec.size, 512);
        assert_eq!(rec.block_time, 480);
    }

    #[test]
    fn block_header_with_zero_gas_limit() {
        let header = json!({ "number": "0x1", "gasUsed": "0x0" });
        let rec = BlockRecord::from_json(&header, BlockSource::HeaderOnly, 0).unwrap();
        assert_eq!(rec.network_utilization, 0.0);
        assert_eq!(rec.transaction_count, 0);
        assert_eq!(rec.hash, None);
    }

    #[test]
    fn block_without_number_is_malformed() {
        let err = BlockRecord::from_json(&json!({"hash": "0x1"}), BlockSource::FullBody, 0);
        assert!(matches!(err, Err(FeedError::MalformedResult { .. })));
    }

    #[test]
    fn transaction_conversion() {
        let tx = json!({
            "hash": "0xfeed",
            "from": "0xaaa",
            "to": null,
            "value": "0xde0b6b3a7640000",
            "gasPrice": "0xba43b7400",
            "gas": "0x5208",
            "blockNumber": "0x2a",
            "input": "0x",
            "nonce": "0x7"
        });
        let rec = TransactionRecord::from_json(&tx, "MON").unwrap();
        assert_eq!(rec.value, "1.000000");
        assert_eq!(rec.gas_price, 50.0);
        assert_eq!(rec.gas_limit, 21_000);
        assert_eq!(rec.block_number, 42);
        assert_eq!(rec.nonce, 7);
        assert_eq!(rec.to, None);
        assert!(rec.has_value());
        assert_eq!(rec.token, "MON");
    }

    #[test]
    fn classified_transaction_flattens() {
        let tx = TransactionRecord::from_json(&json!({"hash": "0x1", "to": "0x2"}), "MON").unwrap();
        let classified = ClassifiedTransaction {
            tx,
            classification: Category::Transfer.into(),
        };
        let v = serde_json::to_value(&classified).unwrap();
        assert_eq!(v["hash"], "0x1");
        assert_eq!(v["category"], "transfer");
        assert_eq!(v["categoryDisplay"], "Transfer");
        assert_eq!(v["dropImage"], "/drops/transfer.png");
    }
}
