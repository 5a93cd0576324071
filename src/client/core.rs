//! Wallet client facade.
//!
//! [`WalletClient`] bundles the session manager and the request dispatcher
//! behind one cloneable handle. A UI shell calls it from its buttons.
//!
//! # Example
//!
//! ```ignore
//! use qubic_connect::{BridgeConnector, WalletClient};
//!
//! # async fn example() -> qubic_connect::Result<()> {
//! let client = WalletClient::builder()
//!     .project_id("2697d5eb4d2e4ae5ca3bcdd4a4e1ebc0")
//!     .connector(BridgeConnector::new("ws://127.0.0.1:9876")?)
//!     .build()?;
//!
//! client.initialize().await?;
//! if !client.is_active() {
//!     let pairing = client.begin_pairing().await?;
//!     println!("Scan: {}", pairing.uri);
//!     pairing.wait().await?;
//! }
//! let accounts = client.request_accounts().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::activity::ActivityLog;
use crate::dispatch::RequestDispatcher;
use crate::error::Result;
use crate::identifiers::Topic;
use crate::protocol::{
    AssetTransfer, Connector, DisconnectReason, MessageRequest, TransactionRequest, Transfer,
};
use crate::session::{Pairing, PairingDisplay, Session, SessionManager, SessionState, SessionStore};

use super::builder::WalletClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// WalletClient
// ============================================================================

/// Handle to a wallet session client.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct WalletClient {
    manager: SessionManager,
    dispatcher: RequestDispatcher,
}

impl fmt::Debug for WalletClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletClient")
            .field("state", &self.state())
            .field("topic", &self.topic())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WalletClient - Construction
// ============================================================================

impl WalletClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> WalletClientBuilder {
        WalletClientBuilder::new()
    }

    /// Creates a client from resolved parts.
    pub(crate) fn new(
        options: ClientOptions,
        connector: Arc<dyn Connector>,
        store: Arc<dyn SessionStore>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        let manager = SessionManager::new(Arc::new(options), connector, store, log);
        Self {
            dispatcher: RequestDispatcher::new(manager.clone()),
            manager,
        }
    }
}

// ============================================================================
// WalletClient - Lifecycle
// ============================================================================

impl WalletClient {
    /// Initializes the protocol client and restores any persisted session.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::initialize`].
    pub async fn initialize(&self) -> Result<()> {
        self.manager.initialize().await
    }

    /// Starts pairing. The returned handle carries the URI and deep link.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::begin_pairing`].
    pub async fn begin_pairing(&self) -> Result<Pairing> {
        self.manager.begin_pairing().await
    }

    /// Returns `true` if a session is held and still live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.manager.is_active()
    }

    /// Returns the live session, or why there is none.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::live_session`].
    pub fn live_session(&self) -> Result<Session> {
        self.manager.live_session()
    }

    /// Disconnects the session with `reason`.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::disconnect`].
    pub async fn disconnect(&self, reason: DisconnectReason) -> Result<()> {
        self.manager.disconnect(reason).await
    }

    /// Disconnects with the user-logout reason (code 6000).
    ///
    /// # Errors
    ///
    /// See [`SessionManager::disconnect`].
    pub async fn logout(&self) -> Result<()> {
        self.disconnect(DisconnectReason::user_logout()).await
    }
}

// ============================================================================
// WalletClient - Requests
// ============================================================================

impl WalletClient {
    /// Lists the wallet's accounts.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn request_accounts(&self) -> Result<Value> {
        self.dispatcher.request_accounts().await
    }

    /// Transfers native value.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_qubic(&self, transfer: &Transfer) -> Result<Value> {
        self.dispatcher.send_qubic(transfer).await
    }

    /// Transfers an issued asset.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_asset(&self, transfer: &AssetTransfer) -> Result<Value> {
        self.dispatcher.send_asset(transfer).await
    }

    /// Signs a transaction.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<Value> {
        self.dispatcher.sign_transaction(tx).await
    }

    /// Signs and broadcasts a transaction.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<Value> {
        self.dispatcher.send_transaction(tx).await
    }

    /// Signs a message.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::dispatch`].
    pub async fn sign_message(&self, message: &MessageRequest) -> Result<Value> {
        self.dispatcher.sign_message(message).await
    }
}

// ============================================================================
// WalletClient - Accessors
// ============================================================================

impl WalletClient {
    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.manager.state()
    }

    /// Returns the held session topic without checking liveness.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Option<Topic> {
        self.manager.topic()
    }

    /// Returns the held session snapshot without checking liveness.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.manager.session()
    }

    /// Returns the pairing URI and deep link while pairing is pending.
    #[inline]
    #[must_use]
    pub fn display(&self) -> Option<PairingDisplay> {
        self.manager.display()
    }

    /// Returns the relay transport flag.
    #[inline]
    #[must_use]
    pub fn is_relay_connected(&self) -> bool {
        self.manager.is_relay_connected()
    }

    /// Returns the session manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::assert_ok;

    use crate::activity::MemoryLog;
    use crate::error::Error;
    use crate::protocol::{ClientEvent, EventKind, unix_now};
    use crate::session::{MemorySessionStore, TeardownCause};
    use crate::testing::{MockClient, MockConnector};

    fn client_with(
        mock: &Arc<MockClient>,
        store: &Arc<MemorySessionStore>,
        log: &Arc<MemoryLog>,
    ) -> WalletClient {
        WalletClient::new(
            ClientOptions::new("test-project"),
            Arc::new(MockConnector::new(Arc::clone(mock))),
            store.clone(),
            log.clone(),
        )
    }

    #[test]
    fn test_client_is_clone_and_debug() {
        fn assert_traits<T: Clone + fmt::Debug + Send + Sync>() {}
        assert_traits::<WalletClient>();
    }

    #[tokio::test]
    async fn test_full_session_round_trip() {
        let mock = Arc::new(MockClient::new());
        let store = Arc::new(MemorySessionStore::new());
        let log = Arc::new(MemoryLog::new());
        let client = client_with(&mock, &store, &log);

        assert_ok!(client.initialize().await);
        assert_eq!(client.state(), SessionState::Idle);

        let pairing = client.begin_pairing().await.expect("pairing");
        assert_eq!(client.display().map(|d| d.uri), Some(pairing.uri.clone()));
        mock.approve(Session::new(Topic::from("T1"), unix_now() + 3600));
        assert_ok!(pairing.wait().await);

        assert_eq!(store.peek(), Some(Topic::from("T1")));
        assert!(client.is_active());

        mock.respond_with(Ok(json!([{"address": "A", "amount": 100}])));
        let accounts = client.request_accounts().await.expect("accounts");
        assert_eq!(accounts[0]["address"], "A");

        assert_ok!(client.logout().await);
        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(store.peek(), None);
        assert!(matches!(
            client.request_accounts().await,
            Err(Error::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_restart_restores_without_pairing() {
        let mock = Arc::new(MockClient::new());
        let store = Arc::new(MemorySessionStore::new());
        let log = Arc::new(MemoryLog::new());

        let first = client_with(&mock, &store, &log);
        assert_ok!(first.initialize().await);
        let pairing = first.begin_pairing().await.expect("pairing");
        mock.approve(Session::new(Topic::from("T1"), unix_now() + 3600));
        assert_ok!(pairing.wait().await);
        drop(first);

        let second = client_with(&mock, &store, &log);
        assert_ok!(second.initialize().await);

        assert_eq!(second.state(), SessionState::Connected);
        assert_eq!(second.topic(), Some(Topic::from("T1")));
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_wallet_side_delete_then_repair() {
        let mock = Arc::new(MockClient::new());
        let store = Arc::new(MemorySessionStore::new());
        let log = Arc::new(MemoryLog::new());
        let client = client_with(&mock, &store, &log);

        assert_ok!(client.initialize().await);
        let pairing = client.begin_pairing().await.expect("pairing");
        mock.approve(Session::new(Topic::from("T1"), unix_now() + 3600));
        assert_ok!(pairing.wait().await);

        mock.remove_session(&Topic::from("T1"));
        mock.emit(ClientEvent::new(
            EventKind::SessionDelete,
            json!({"id": 1, "topic": "T1"}),
        ));

        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(
            client.manager().last_teardown(),
            Some(TeardownCause::Deleted)
        );
        assert!(log.contains("Session delete received"));

        // Pairing is available again.
        assert_ok!(client.begin_pairing().await);
    }
}
