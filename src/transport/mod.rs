//! WebSocket bridge transport.
//!
//! A [`ProtocolClient`](crate::protocol::ProtocolClient) implementation that
//! talks to a local bridge process hosting the relay SDK.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  WalletClient    │                              │  Bridge          │
//! │                  │         WebSocket            │                  │
//! │  BridgeClient    │◄────────────────────────────►│  Relay SDK       │──► relay ──► wallet
//! │  → Connection    │      ws://127.0.0.1:PORT     │  Session store   │
//! └──────────────────┘                              └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `BridgeConnector::init` - Open the WebSocket
//! 2. `client.init` - Construct the protocol client inside the bridge
//! 3. `session.getAll` - Seed the local registry mirror
//! 4. `BridgeClient` - Send calls, receive events
//! 5. Stream end - Pending calls fail, relay reported down
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Connector and protocol client |
//! | `connection` | WebSocket connection and event loop |
//! | `frame` | Wire frames |

// ============================================================================
// Submodules
// ============================================================================

/// Connector and protocol client over the bridge.
pub mod bridge;

/// WebSocket connection and event loop.
pub mod connection;

/// Bridge wire frames.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{BridgeClient, BridgeConnector, DEFAULT_REQUEST_TIMEOUT};
pub use connection::{Connection, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_PENDING, Inbound, InboundHandler};
pub use frame::{BridgeError, BridgeEvent, BridgeRequest, BridgeResponse};
