//! Request methods and their parameter payloads.
//!
//! Method names follow the `qubic_methodName` format the wallet registers.
//!
//! | Method | Wire name | Mutates state |
//! |--------|-----------|---------------|
//! | [`Method::RequestAccounts`] | `qubic_requestAccounts` | no |
//! | [`Method::SendQubic`] | `qubic_sendQubic` | yes |
//! | [`Method::SendAsset`] | `qubic_sendAsset` | yes |
//! | [`Method::SignTransaction`] | `qubic_signTransaction` | yes |
//! | [`Method::SendTransaction`] | `qubic_sendTransaction` | yes |
//! | [`Method::Sign`] | `qubic_sign` | no |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

// ============================================================================
// Method
// ============================================================================

/// Request methods this client may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// List the wallet's accounts.
    RequestAccounts,
    /// Transfer native value.
    SendQubic,
    /// Transfer an issued asset.
    SendAsset,
    /// Sign a transaction without broadcasting.
    SignTransaction,
    /// Sign and broadcast a transaction.
    SendTransaction,
    /// Sign an arbitrary message.
    Sign,
}

impl Method {
    /// Every method, in capability declaration order.
    pub const ALL: [Method; 6] = [
        Method::RequestAccounts,
        Method::SendQubic,
        Method::SendAsset,
        Method::SignTransaction,
        Method::SendTransaction,
        Method::Sign,
    ];

    /// Returns the wire name of the method.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestAccounts => "qubic_requestAccounts",
            Self::SendQubic => "qubic_sendQubic",
            Self::SendAsset => "qubic_sendAsset",
            Self::SignTransaction => "qubic_signTransaction",
            Self::SendTransaction => "qubic_sendTransaction",
            Self::Sign => "qubic_sign",
        }
    }

    /// Returns a short phrase used in failure narration ("Failed to ...").
    #[inline]
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::RequestAccounts => "request accounts",
            Self::SendQubic => "send qubic",
            Self::SendAsset => "send asset",
            Self::SignTransaction => "sign transaction",
            Self::SendTransaction => "send transaction",
            Self::Sign => "sign message",
        }
    }

    /// Returns `true` if the method moves value or touches chain state.
    ///
    /// Mutating requests carry a timestamp nonce.
    #[inline]
    #[must_use]
    pub fn is_state_mutating(self) -> bool {
        !matches!(self, Self::RequestAccounts | Self::Sign)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RequestParams
// ============================================================================

/// Caller-supplied request fields.
///
/// `None` fields serialize as JSON `null`; the wallet decides whether that is
/// acceptable.
pub trait RequestParams: Serialize + Send + Sync {
    /// Returns the first required field that is absent or empty.
    fn first_missing(&self) -> Option<&'static str>;
}

/// Returns `true` for `None` and for blank strings.
fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// Parameters for `qubic_requestAccounts` (none).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountsQuery {}

impl RequestParams for AccountsQuery {
    fn first_missing(&self) -> Option<&'static str> {
        None
    }
}

/// Native value transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// Source identity.
    pub from: Option<String>,
    /// Destination identity.
    pub to: Option<String>,
    /// Amount in base units.
    pub amount: Option<u64>,
}

impl RequestParams for Transfer {
    fn first_missing(&self) -> Option<&'static str> {
        if blank(&self.from) {
            Some("from")
        } else if blank(&self.to) {
            Some("to")
        } else if self.amount.is_none() {
            Some("amount")
        } else {
            None
        }
    }
}

/// Issued asset transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfer {
    /// Source identity.
    pub from: Option<String>,
    /// Destination identity.
    pub to: Option<String>,
    /// Asset name.
    pub asset_name: Option<String>,
    /// Number of shares to transfer.
    pub amount: Option<u64>,
    /// Issuer identity of the asset.
    pub issuer: Option<String>,
}

impl RequestParams for AssetTransfer {
    fn first_missing(&self) -> Option<&'static str> {
        if blank(&self.from) {
            Some("from")
        } else if blank(&self.to) {
            Some("to")
        } else if blank(&self.asset_name) {
            Some("assetName")
        } else if self.amount.is_none() {
            Some("amount")
        } else if blank(&self.issuer) {
            Some("issuer")
        } else {
            None
        }
    }
}

/// Transaction to sign or send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Source identity.
    pub from: Option<String>,
    /// Destination identity.
    pub to: Option<String>,
    /// Amount in base units.
    pub amount: Option<u64>,
    /// Target tick.
    pub tick: Option<u32>,
    /// Contract input type.
    pub input_type: Option<u16>,
    /// Contract input payload.
    pub payload: Option<Payload>,
}

impl TransactionRequest {
    /// Returns a copy where an empty payload is sent as `null`.
    #[must_use]
    pub fn with_blank_payload_as_null(&self) -> Self {
        let mut tx = self.clone();
        if tx.payload.as_ref().is_some_and(Payload::is_empty) {
            tx.payload = None;
        }
        tx
    }
}

impl RequestParams for TransactionRequest {
    fn first_missing(&self) -> Option<&'static str> {
        if blank(&self.from) {
            Some("from")
        } else if blank(&self.to) {
            Some("to")
        } else if self.amount.is_none() {
            Some("amount")
        } else if self.tick.is_none() {
            Some("tick")
        } else {
            None
        }
    }
}

/// Message signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageRequest {
    /// Signing identity.
    pub from: Option<String>,
    /// Message text.
    pub message: Option<String>,
}

impl RequestParams for MessageRequest {
    fn first_missing(&self) -> Option<&'static str> {
        if blank(&self.from) {
            Some("from")
        } else if blank(&self.message) {
            Some("message")
        } else {
            None
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Opaque contract input. Bytes travel base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Already-encoded text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Returns `true` if the payload carries nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_method_names() {
        let names: Vec<_> = Method::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(
            names,
            [
                "qubic_requestAccounts",
                "qubic_sendQubic",
                "qubic_sendAsset",
                "qubic_signTransaction",
                "qubic_sendTransaction",
                "qubic_sign",
            ]
        );
    }

    #[test]
    fn test_read_only_methods() {
        assert!(!Method::RequestAccounts.is_state_mutating());
        assert!(!Method::Sign.is_state_mutating());
        assert!(Method::SendQubic.is_state_mutating());
        assert!(Method::SendTransaction.is_state_mutating());
    }

    #[test]
    fn test_nulls_pass_through() {
        let value = serde_json::to_value(Transfer::default()).expect("serialize");
        assert_eq!(value, json!({"from": null, "to": null, "amount": null}));
    }

    #[test]
    fn test_asset_transfer_camel_case() {
        let transfer = AssetTransfer {
            asset_name: Some("QX".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(transfer).expect("serialize");
        assert_eq!(value["assetName"], "QX");
        assert_eq!(value["issuer"], Value::Null);
    }

    #[test]
    fn test_accounts_query_is_empty_object() {
        let value = serde_json::to_value(AccountsQuery::default()).expect("serialize");
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_bytes_payload_base64() {
        let tx = TransactionRequest {
            payload: Some(Payload::Bytes(vec![1, 2, 3])),
            ..Default::default()
        };
        let value = serde_json::to_value(tx).expect("serialize");
        assert_eq!(value["payload"], "AQID");
        assert_eq!(value["inputType"], Value::Null);
    }

    #[test]
    fn test_blank_payload_as_null() {
        let tx = TransactionRequest {
            payload: Some(Payload::Text(String::new())),
            ..Default::default()
        };
        assert_eq!(tx.with_blank_payload_as_null().payload, None);
    }

    #[test]
    fn test_first_missing() {
        let transfer = Transfer {
            from: Some("A".into()),
            to: Some("  ".into()),
            amount: Some(1),
        };
        assert_eq!(transfer.first_missing(), Some("to"));

        let message = MessageRequest {
            from: Some("A".into()),
            message: Some("hello".into()),
        };
        assert_eq!(message.first_missing(), None);
        assert_eq!(AccountsQuery::default().first_missing(), None);
    }
}
