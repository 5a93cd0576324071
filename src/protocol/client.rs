//! Contract of the protocol client collaborator.
//!
//! The protocol client owns the relay connection, the cryptographic
//! handshake and the authoritative session registry. This crate only drives
//! it through [`ProtocolClient`], obtained asynchronously from a
//! [`Connector`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::Topic;
use crate::session::Session;

use super::{CapabilityRequest, ClientEvent, DisconnectReason, PairingProposal, SessionRequest};

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called for each notification. Must return quickly.
pub type EventHandler = Box<dyn Fn(ClientEvent) + Send + Sync>;

// ============================================================================
// InitConfig
// ============================================================================

/// Identity handed to the protocol client on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    /// Relay project identifier.
    pub project_id: String,
    /// Descriptive metadata shown to the wallet.
    pub metadata: AppMetadata,
}

/// Application metadata shown in the wallet's approval prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Application URL.
    pub url: String,
    /// Icon URLs.
    pub icons: Vec<String>,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "Qubic Connect".to_string(),
            description: "Qubic wallet session client".to_string(),
            url: "https://qubic.org".to_string(),
            icons: Vec::new(),
        }
    }
}

// ============================================================================
// ProtocolClient
// ============================================================================

/// Operations consumed from the protocol client.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Requests a pairing URI for `capabilities`.
    async fn connect(&self, capabilities: &CapabilityRequest) -> Result<PairingProposal>;

    /// Sends a request on a session and waits for the wallet's result.
    async fn request(&self, request: SessionRequest) -> Result<Value>;

    /// Tears down a session.
    async fn disconnect(&self, topic: &Topic, reason: &DisconnectReason) -> Result<()>;

    /// Looks up a live session in the registry.
    fn session(&self, topic: &Topic) -> Option<Session>;

    /// Returns every live session in the registry.
    fn sessions(&self) -> Vec<Session>;

    /// Registers the handler receiving all notifications.
    fn subscribe(&self, handler: EventHandler);

    /// Returns the relay transport connectivity flag.
    fn is_relay_connected(&self) -> bool;
}

// ============================================================================
// Connector
// ============================================================================

/// Asynchronous constructor of a [`ProtocolClient`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// Builds and initializes the protocol client.
    async fn init(&self, config: &InitConfig) -> Result<Arc<dyn ProtocolClient>>;
}
