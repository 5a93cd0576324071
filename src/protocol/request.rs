//! Request envelopes sent through the protocol client.
//!
//! # Format
//!
//! ```json
//! {
//!   "topic": "session topic",
//!   "chainId": "qubic:main",
//!   "request": {
//!     "method": "qubic_sendQubic",
//!     "params": { "from": "...", "to": "...", "amount": 10, "nonce": "1718000000000" }
//!   }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::{ChainId, Topic};

use super::{Method, RequestParams};

// ============================================================================
// SessionRequest
// ============================================================================

/// A request scoped to one session and chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Session topic.
    pub topic: Topic,
    /// Chain the request targets.
    pub chain_id: ChainId,
    /// Method and params.
    pub request: RequestEnvelope,
}

// ============================================================================
// RequestEnvelope
// ============================================================================

/// Method name plus params object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Wire method name.
    pub method: String,
    /// Params object.
    pub params: Value,
}

impl RequestEnvelope {
    /// Builds an envelope for `method` from caller fields.
    ///
    /// State-mutating methods get a `nonce` stamped from the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the params fail to serialize.
    pub fn build<P: RequestParams + ?Sized>(method: Method, params: &P) -> Result<Self> {
        let mut params = match serde_json::to_value(params)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        if method.is_state_mutating() {
            params.insert("nonce".to_string(), Value::String(nonce()));
        }

        Ok(Self {
            method: method.as_str().to_string(),
            params: Value::Object(params),
        })
    }
}

/// Current wall-clock time in milliseconds, stringified.
///
/// A uniqueness hint only: two calls in the same millisecond collide.
#[must_use]
pub fn nonce() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ============================================================================
// DisconnectReason
// ============================================================================

/// Reason sent with a session teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectReason {
    /// Reason code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl DisconnectReason {
    /// Code used for user-initiated logout.
    pub const USER_LOGOUT_CODE: i64 = 6000;

    /// Creates a reason.
    #[inline]
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The user logged out.
    #[inline]
    #[must_use]
    pub fn user_logout() -> Self {
        Self::new(Self::USER_LOGOUT_CODE, "User logged out")
    }
}

impl Default for DisconnectReason {
    fn default() -> Self {
        Self::user_logout()
    }
}

// ============================================================================
// Tests
// ============================================================================
