//! Inbound frame classification.
//!
//! Frames are told apart by shape, not by request bookkeeping:
//!
//! ```text
//! {"id":N,"result":"0x…"}                                  → Ack
//! {"id":N,"error":{…}}                                     → RpcError
//! {"method":"eth_subscription","params":{"result":{number…}}} → NewHead
//! {"method":"eth_subscription","params":{"result":"0x…"}}     → TransactionHash
//! {"method":"eth_subscription","params":{"result":{hash…}}}   → Transaction
//! ```

use serde_json::Value;

use chainfeed_core::request::{JsonRpcError, RpcId};
use chainfeed_core::units;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `eth_subscribe` acknowledgment carrying the subscription id.
    Ack { id: RpcId, subscription: String },
    /// A response carrying a JSON-RPC error object.
    RpcError { id: RpcId, error: JsonRpcErrorBody },
    /// New block header.
    NewHead { subscription: String, header: Value },
    /// Pending transaction announced by hash.
    TransactionHash { subscription: String, hash: String },
    /// Pending transaction delivered in full.
    Transaction { subscription: String, tx: Value },
    /// Valid JSON that is none of the above.
    Ignored(&'static str),
}

/// Error object of a [`Frame::RpcError`].
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl From<JsonRpcError> for JsonRpcErrorBody {
    fn from(e: JsonRpcError) -> Self {
        Self {
            code: e.code,
            message: e.message,
        }
    }
}

/// Parse one text frame.
pub fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    Ok(classify(value))
}

fn classify(mut value: Value) -> Frame {
    if value.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        let Some(params) = value.get_mut("params") else {
            return Frame::Ignored("notification without params");
        };
        let subscription = params
            .get("subscription")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let result = params.get_mut("result").map(Value::take).unwrap_or(Value::Null);
        return notification(subscription, result);
    }

    if value.get("method").is_some() {
        return Frame::Ignored("unsupported method");
    }

    let id = value
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value::<RpcId>(v).ok())
        .unwrap_or(RpcId::Null);

    if let Some(err) = value.get_mut("error").map(Value::take) {
        return match serde_json::from_value::<JsonRpcError>(err) {
            Ok(e) => Frame::RpcError { id, error: e.into() },
            Err(_) => Frame::Ignored("unrecognised error object"),
        };
    }

    match value.get("result").and_then(Value::as_str) {
        Some(sub) => Frame::Ack {
            id,
            subscription: sub.to_string(),
        },
        None => Frame::Ignored("response without subscription id"),
    }
}

fn notification(subscription: String, result: Value) -> Frame {
    if result.get("number").is_some() {
        return Frame::NewHead {
            subscription,
            header: result,
        };
    }
    if result.get("hash").is_some() {
        return Frame::Transaction {
            subscription,
            tx: result,
        };
    }
    match result {
        Value::String(hash) if units::is_hex_string(&hash) => {
            Frame::TransactionHash { subscription, hash }
        }
        _ => Frame::Ignored("unrecognised notification payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_ack() {
        let frame = parse_frame(r#"{"jsonrpc":"2.0","id":3,"result":"0x9cef478923ff08bf67fde6c64013158d"}"#)
            .unwrap();
        assert_eq!(
            frame,
            Frame::Ack {
                id: RpcId::Number(3),
                subscription: "0x9cef478923ff08bf67fde6c64013158d".into()
            }
        );
    }

    #[test]
    fn new_head_notification() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0xabc",
                "result": {"number": "0x1b4", "hash": "0xdead"}
            }
        })
        .to_string();
        match parse_frame(&text).unwrap() {
            Frame::NewHead { subscription, header } => {
                assert_eq!(subscription, "0xabc");
                assert_eq!(header["number"], "0x1b4");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transaction_hash_notification() {
        let text = json!({
            "method": "eth_subscription",
            "params": {"subscription": "0x1", "result": "0xd6fdc5cc41a9959e922f30cb772a9aef46f4daea279307bc5f7024edc4ccd7fa"}
        })
        .to_string();
        assert!(matches!(
            parse_frame(&text).unwrap(),
            Frame::TransactionHash { hash, .. } if hash.starts_with("0xd6fd")
        ));
    }

    #[test]
    fn full_transaction_notification() {
        let text = json!({
            "method": "eth_subscription",
            "params": {"subscription": "0x1", "result": {"hash": "0x5", "to": null}}
        })
        .to_string();
        assert!(matches!(parse_frame(&text).unwrap(), Frame::Transaction { .. }));
    }

    #[test]
    fn error_frame() {
        let frame =
            parse_frame(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#)
                .unwrap();
        assert_eq!(
            frame,
            Frame::RpcError {
                id: RpcId::Number(1),
                error: JsonRpcErrorBody {
                    code: -32601,
                    message: "method not found".into()
                }
            }
        );
    }

    #[test]
    fn non_hex_string_result_is_ignored() {
        let text = json!({
            "method": "eth_subscription",
            "params": {"subscription": "0x1", "result": "syncing"}
        })
        .to_string();
        assert!(matches!(parse_frame(&text).unwrap(), Frame::Ignored(_)));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_frame("not json").is_err());
    }
}
