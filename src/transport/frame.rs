//! Bridge wire frames.
//!
//! The bridge is a local WebSocket process hosting the relay SDK. Frames are
//! JSON text messages.
//!
//! # Frames
//!
//! | Frame | Direction | Shape |
//! |-------|-----------|-------|
//! | [`BridgeRequest`] | Local → Bridge | `{ id, method, params }` |
//! | [`BridgeResponse`] | Bridge → Local | `{ id, type: success\|error, result?, error? }` |
//! | [`BridgeEvent`] | Bridge → Local | `{ type: "event", method, params }` |
//!
//! # Methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `client.init` | `InitConfig` | `{ relayConnected }` |
//! | `client.connect` | `CapabilityRequest` | `{ uri }` |
//! | `client.request` | `SessionRequest` | wallet result |
//! | `client.disconnect` | `{ topic, reason }` | `null` |
//! | `session.getAll` | `{}` | `[Session]` |
//!
//! Events carry protocol client notification names (`session_delete`, ...)
//! plus `pairing.approved` and `pairing.rejected`, keyed by `pairingTopic`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, Topic};
use crate::protocol::DisconnectReason;

// ============================================================================
// Method Names
// ============================================================================

/// Initializes the protocol client inside the bridge.
pub const METHOD_INIT: &str = "client.init";

/// Requests a pairing URI.
pub const METHOD_CONNECT: &str = "client.connect";

/// Sends a session request.
pub const METHOD_REQUEST: &str = "client.request";

/// Tears down a session.
pub const METHOD_DISCONNECT: &str = "client.disconnect";

/// Lists live sessions.
pub const METHOD_SESSIONS: &str = "session.getAll";

/// Pairing approved, with the new session.
pub const EVENT_PAIRING_APPROVED: &str = "pairing.approved";

/// Pairing rejected by the wallet.
pub const EVENT_PAIRING_REJECTED: &str = "pairing.rejected";

// ============================================================================
// BridgeRequest
// ============================================================================

/// A request from the local end to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Correlation id.
    pub id: RequestId,
    /// Bridge method name.
    pub method: String,
    /// Method params.
    pub params: Value,
}

impl BridgeRequest {
    /// Creates a request with a fresh id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            method: method.into(),
            params,
        }
    }

    /// Creates a request serializing `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `params` fails to serialize.
    pub fn with_params<T: Serialize + ?Sized>(method: &str, params: &T) -> Result<Self> {
        Ok(Self::new(method, serde_json::to_value(params)?))
    }

    /// Creates a `client.disconnect` request.
    #[must_use]
    pub fn disconnect(topic: &Topic, reason: &DisconnectReason) -> Self {
        Self::new(
            METHOD_DISCONNECT,
            json!({ "topic": topic, "reason": reason }),
        )
    }
}

// ============================================================================
// BridgeResponse
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// The call succeeded.
    Success,
    /// The call failed.
    Error,
}

/// Structured error reported by the bridge or the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Extra payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A response from the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// Matches the request `id`.
    pub id: RequestId,
    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            response_type: ResponseType::Success,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(id: RequestId, error: BridgeError) -> Self {
        Self {
            id,
            response_type: ResponseType::Error,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Extracts the result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] with the reported code, message and data if
    /// the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let error = self.error.unwrap_or(BridgeError {
                    code: 0,
                    message: "unknown error".to_string(),
                    data: None,
                });
                Err(Error::remote(error.code, error.message, error.data))
            }
        }
    }
}

// ============================================================================
// BridgeEvent
// ============================================================================

/// A notification pushed by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    /// Always `"event"`.
    #[serde(rename = "type")]
    pub event_type: EventMarker,
    /// Event name.
    pub method: String,
    /// Event payload.
    #[serde(default)]
    pub params: Value,
}

/// Marker accepting only `"event"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMarker {
    /// Event frame.
    Event,
}

impl BridgeEvent {
    /// Creates an event frame.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            event_type: EventMarker::Event,
            method: method.into(),
            params,
        }
    }

    /// Returns the pairing topic the event refers to, if any.
    #[must_use]
    pub fn pairing_topic(&self) -> Option<Topic> {
        self.params
            .get("pairingTopic")
            .and_then(Value::as_str)
            .and_then(Topic::new)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = BridgeRequest::disconnect(&Topic::from("T1"), &DisconnectReason::user_logout());
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["method"], "client.disconnect");
        assert_eq!(json["params"]["topic"], "T1");
        assert_eq!(json["params"]["reason"]["code"], 6000);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_error_response_into_remote() {
        let raw = json!({
            "id": RequestId::generate(),
            "type": "error",
            "error": { "code": 5000, "message": "User rejected." }
        });
        let response: BridgeResponse = serde_json::from_value(raw).expect("parse");

        assert!(!response.is_success());
        match response.into_result() {
            Err(Error::Remote { code, message, .. }) => {
                assert_eq!(code, 5000);
                assert_eq!(message, "User rejected.");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_success_without_result_is_null() {
        let raw = json!({ "id": RequestId::generate(), "type": "success" });
        let response: BridgeResponse = serde_json::from_value(raw).expect("parse");
        assert_eq!(response.into_result().expect("ok"), Value::Null);
    }

    #[test]
    fn test_event_is_not_a_response() {
        let text = r#"{"type":"event","method":"session_delete","params":{"topic":"T1"}}"#;
        assert!(serde_json::from_str::<BridgeResponse>(text).is_err());

        let event: BridgeEvent = serde_json::from_str(text).expect("event");
        assert_eq!(event.method, "session_delete");
    }

    #[test]
    fn test_response_is_not_an_event() {
        let text = serde_json::to_string(&BridgeResponse::success(RequestId::generate(), json!(1)))
            .expect("serialize");
        assert!(serde_json::from_str::<BridgeEvent>(&text).is_err());
    }

    #[test]
    fn test_pairing_topic() {
        let event = BridgeEvent::new(EVENT_PAIRING_REJECTED, json!({"pairingTopic": "P1"}));
        assert_eq!(event.pairing_topic(), Some(Topic::from("P1")));
    }
}
