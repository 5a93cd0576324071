//! Protocol-facing types.
//!
//! This module defines what the client exchanges with the protocol client
//! collaborator: the capability request sent when pairing, request
//! envelopes, inbound notifications, and the collaborator traits.
//!
//! # Protocol Overview
//!
//! | Item | Direction | Purpose |
//! |------|-----------|---------|
//! | `CapabilityRequest` | Local → Wallet | Namespaces, methods, events to authorize |
//! | `PairingProposal` | Client → Local | URI plus approval handle |
//! | `SessionRequest` | Local → Wallet | Method call on a session |
//! | `ClientEvent` | Client → Local | Session, proposal and relay notifications |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `capability` | Capability request |
//! | `client` | `ProtocolClient` and `Connector` traits |
//! | `event` | Event kinds and payloads |
//! | `method` | Methods and parameter types |
//! | `pairing` | Pairing proposals and URIs |
//! | `request` | Request envelopes and disconnect reasons |

// ============================================================================
// Submodules
// ============================================================================

/// Capability request declared when pairing.
pub mod capability;

/// Protocol client collaborator traits.
pub mod client;

/// Inbound notification types.
pub mod event;

/// Request methods and parameters.
pub mod method;

/// Pairing proposals and URIs.
pub mod pairing;

/// Request envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use capability::{CapabilityRequest, DEFAULT_SESSION_EVENTS, NamespaceRequest};
pub use client::{AppMetadata, Connector, EventHandler, InitConfig, ProtocolClient};
pub use event::{ClientEvent, EventKind};
pub use method::{
    AccountsQuery, AssetTransfer, MessageRequest, Method, Payload, RequestParams,
    TransactionRequest, Transfer,
};
pub use pairing::{Approval, DEFAULT_DEEP_LINK_PREFIX, PairingProposal, PairingUri, deep_link};
pub use request::{DisconnectReason, RequestEnvelope, SessionRequest, nonce, unix_now};
