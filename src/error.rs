//! Error types for the wallet session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use qubic_connect::{Result, WalletClient};
//!
//! async fn example(client: &WalletClient) -> Result<()> {
//!     let accounts = client.request_accounts().await?;
//!     println!("{accounts}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InitializationFailure`] |
//! | Lifecycle | [`Error::InvalidState`], [`Error::PairingInProgress`], [`Error::DisconnectInProgress`] |
//! | Session | [`Error::NoActiveSession`], [`Error::StaleSession`] |
//! | Pairing | [`Error::PairingFailed`], [`Error::ApprovalRejected`], [`Error::ApprovalTimeout`] |
//! | Requests | [`Error::RequestFailed`], [`Error::MissingField`], [`Error::Remote`] |
//! | Teardown | [`Error::DisconnectFailed`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`], [`Error::Protocol`] |
//! | Storage | [`Error::Store`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, Topic};
use crate::session::SessionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The protocol client failed to construct, or is not ready yet.
    ///
    /// Fatal: no session operation is possible until initialization succeeds.
    #[error("Initialization failed: {message}")]
    InitializationFailure {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation is not valid from the current lifecycle state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the manager was in.
        state: SessionState,
    },

    /// A pairing attempt is already awaiting approval.
    #[error("Pairing already in progress")]
    PairingInProgress,

    /// A disconnect is already in flight.
    #[error("Disconnect already in progress")]
    DisconnectInProgress,

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A request was attempted without a valid session.
    #[error("No active session")]
    NoActiveSession,

    /// The held session is no longer live in the protocol client registry.
    #[error("Stale session: {topic}")]
    StaleSession {
        /// Topic of the stale session.
        topic: Topic,
    },

    // ========================================================================
    // Pairing Errors
    // ========================================================================
    /// The protocol client could not produce a pairing proposal.
    #[error("Pairing failed: {message}")]
    PairingFailed {
        /// Description of the failure.
        message: String,
    },

    /// The wallet declined the pairing proposal.
    #[error("Approval rejected: {message}")]
    ApprovalRejected {
        /// Reason reported by the wallet or relay.
        message: String,
    },

    /// The pairing proposal expired before the wallet answered.
    #[error("Approval timed out")]
    ApprovalTimeout,

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// A dispatched request was rejected.
    #[error("Request {method} failed: {message}")]
    RequestFailed {
        /// Method name of the failed request.
        method: String,
        /// Error message.
        message: String,
        /// Raw structured error, when one was available.
        data: Option<Value>,
    },

    /// A required request field was empty while local validation is enabled.
    #[error("Missing field {field} for {method}")]
    MissingField {
        /// Method name of the request.
        method: String,
        /// Name of the empty field.
        field: &'static str,
    },

    /// Structured error reported by the remote side.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional error payload.
        data: Option<Value>,
    },

    // ========================================================================
    // Teardown Errors
    // ========================================================================
    /// Remote teardown was rejected. Local state was cleared anyway.
    #[error("Disconnect failed: {message}")]
    DisconnectFailed {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connection to the bridge failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Bridge request timed out.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Protocol violation or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Session store could not be read or written.
    #[error("Session store error: {message}")]
    Store {
        /// Description of the storage error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an initialization failure.
    #[inline]
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::InitializationFailure {
            message: message.into(),
        }
    }

    /// Creates an initialization failure for calls made before readiness.
    #[inline]
    pub fn not_initialized() -> Self {
        Self::initialization("protocol client is not initialized")
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a pairing failure.
    #[inline]
    pub fn pairing_failed(message: impl Into<String>) -> Self {
        Self::PairingFailed {
            message: message.into(),
        }
    }

    /// Creates an approval rejected error.
    #[inline]
    pub fn approval_rejected(message: impl Into<String>) -> Self {
        Self::ApprovalRejected {
            message: message.into(),
        }
    }

    /// Creates a request failure.
    #[inline]
    pub fn request_failed(
        method: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self::RequestFailed {
            method: method.into(),
            message: message.into(),
            data,
        }
    }

    /// Creates a missing field error.
    #[inline]
    pub fn missing_field(method: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            method: method.into(),
            field,
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a disconnect failure.
    #[inline]
    pub fn disconnect_failed(message: impl Into<String>) -> Self {
        Self::DisconnectFailed {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a session store error.
    #[inline]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

impl Error {
    /// Normalizes a protocol client failure into [`Error::RequestFailed`].
    ///
    /// Structured remote errors keep their message and raw shape; anything
    /// else is rendered through `Display`.
    #[must_use]
    pub fn into_request_failure(self, method: &str) -> Self {
        match self {
            Self::RequestFailed { .. } | Self::NoActiveSession | Self::MissingField { .. } => self,
            Self::Remote {
                code,
                message,
                data,
            } => {
                let raw = serde_json::json!({
                    "code": code,
                    "message": message,
                    "data": data,
                });
                Self::request_failed(method, message, Some(raw))
            }
            other => Self::request_failed(method, other.to_string(), None),
        }
    }

    /// Returns the structured payload attached to this error, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::RequestFailed { data, .. } | Self::Remote { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ApprovalTimeout | Self::RequestTimeout { .. })
    }

    /// Returns `true` if this error concerns session validity.
    #[inline]
    #[must_use]
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::NoActiveSession | Self::StaleSession { .. })
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the client usable: pairing again or retrying
    /// the request may succeed.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoActiveSession
                | Self::StaleSession { .. }
                | Self::ApprovalRejected { .. }
                | Self::ApprovalTimeout
                | Self::RequestFailed { .. }
                | Self::RequestTimeout { .. }
                | Self::DisconnectFailed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("bridge unreachable");
        assert_eq!(err.to_string(), "Connection failed: bridge unreachable");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::invalid_state("disconnect", SessionState::Idle);
        assert_eq!(err.to_string(), "Cannot disconnect while idle");
    }

    #[test]
    fn test_remote_into_request_failure_keeps_shape() {
        let err = Error::remote(5000, "User rejected", None).into_request_failure("qubic_sign");

        match err {
            Error::RequestFailed {
                method,
                message,
                data,
            } => {
                assert_eq!(method, "qubic_sign");
                assert_eq!(message, "User rejected");
                let data = data.expect("structured data");
                assert_eq!(data["code"], 5000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transport_into_request_failure_renders_string() {
        let err = Error::ConnectionClosed.into_request_failure("qubic_sendQubic");
        assert!(matches!(
            err,
            Error::RequestFailed { ref message, data: None, .. } if message == "Connection closed"
        ));
    }

    #[test]
    fn test_no_active_session_is_not_wrapped() {
        let err = Error::NoActiveSession.into_request_failure("qubic_sign");
        assert!(matches!(err, Error::NoActiveSession));
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::ApprovalTimeout.is_timeout());
        assert!(!Error::approval_rejected("no").is_timeout());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::NoActiveSession.is_recoverable());
        assert!(Error::disconnect_failed("relay down").is_recoverable());
        assert!(!Error::initialization("no relay").is_recoverable());
        assert!(!Error::config("missing project id").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
