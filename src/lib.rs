//! Qubic Connect - session lifecycle and request correlation for
//! relay-paired Qubic wallets.
//!
//! A desktop or web shell pairs with a mobile wallet over a relay, keeps a
//! durable session, and routes signing and transfer requests to it.
//!
//! # Architecture
//!
//! The client drives an injected protocol client:
//!
//! - **Local End (Rust)**: Session state machine, persistence, request dispatch
//! - **Protocol Client**: Relay connection, handshake, authoritative registry
//!
//! Key design principles:
//!
//! - Liveness is always re-derived from the protocol client's registry
//! - One durable key (`sessionTopic`) survives restarts
//! - At most one pairing and one disconnect in flight
//! - Requests are independent; no queue, no retry
//!
//! # Quick Start
//!
//! ```no_run
//! use qubic_connect::{BridgeConnector, MessageRequest, Result, WalletClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WalletClient::builder()
//!         .project_id("2697d5eb4d2e4ae5ca3bcdd4a4e1ebc0")
//!         .connector(BridgeConnector::new("ws://127.0.0.1:9876")?)
//!         .build()?;
//!
//!     client.initialize().await?;
//!
//!     if !client.is_active() {
//!         let pairing = client.begin_pairing().await?;
//!         println!("Open in wallet: {}", pairing.deep_link);
//!         pairing.wait().await?;
//!     }
//!
//!     let accounts = client.request_accounts().await?;
//!     println!("{accounts}");
//!
//!     let signed = client
//!         .sign_message(&MessageRequest {
//!             from: Some("BZBQFLLBNCXEMGLOBHUVFTLUPLVCPQUASSILFABOFFBCADQSSUPNWLZBQEXK".into()),
//!             message: Some("hello".into()),
//!         })
//!         .await?;
//!     println!("{signed}");
//!
//!     client.logout().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`activity`] | Human-readable narration sinks |
//! | [`client`] | [`WalletClient`] facade and builder |
//! | [`dispatch`] | Request dispatch |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Protocol client contract and message types |
//! | [`router`] | Notification routing |
//! | [`session`] | Session state machine and persistence |
//! | [`transport`] | WebSocket bridge protocol client |

// ============================================================================
// Modules
// ============================================================================

/// Activity log sinks and rendering.
pub mod activity;

/// Client facade and configuration.
///
/// Use [`WalletClient::builder()`] to create a configured client.
pub mod client;

/// Request dispatch on the active session.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Protocol client contract and message types.
pub mod protocol;

/// Notification routing into the session manager.
pub mod router;

/// Session lifecycle, state and persistence.
pub mod session;

/// WebSocket bridge transport.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientOptions, ParamPolicy, WalletClient, WalletClientBuilder};

// Activity types
pub use activity::{ActivityLog, MemoryLog, TracingLog};

// Dispatch types
pub use dispatch::RequestDispatcher;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChainId, RequestId, Topic};

// Protocol types
pub use protocol::{
    AccountsQuery, AppMetadata, AssetTransfer, CapabilityRequest, ClientEvent, Connector,
    DisconnectReason, EventKind, InitConfig, MessageRequest, Method, Payload, PairingUri,
    ProtocolClient, TransactionRequest, Transfer,
};

// Router types
pub use router::EventRouter;

// Session types
pub use session::{
    FileSessionStore, MemorySessionStore, Pairing, PairingDisplay, Session, SessionManager,
    SessionState, SessionStore, TeardownCause,
};

// Transport types
pub use transport::{BridgeClient, BridgeConnector};
