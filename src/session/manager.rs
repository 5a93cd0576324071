//! Session lifecycle manager.
//!
//! Owns the state machine
//! `Uninitialized → Initializing → Idle → Pairing → Connected → Idle` and is
//! the only writer of the persisted session reference.
//!
//! # Invariants
//!
//! - At most one pairing attempt is unresolved at a time.
//! - At most one disconnect is in flight at a time.
//! - The persisted reference is present iff a session is held. Teardown
//!   clears it together with the held session and the pairing display.
//! - Liveness is always re-derived from the protocol client's registry.
//!
//! Lock order is lifecycle → store. Neither lock is held across an await.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::activity::{ActivityLog, render, render_pretty};
use crate::client::ClientOptions;
use crate::error::{Error, Result};
use crate::identifiers::Topic;
use crate::protocol::{
    Connector, DisconnectReason, PairingProposal, PairingUri, ProtocolClient, deep_link,
};
use crate::router::EventRouter;

use super::state::{PairingDisplay, Session, SessionState, TeardownCause};
use super::store::SessionStore;

// ============================================================================
// Types
// ============================================================================

/// Mutable lifecycle state, guarded by one lock.
struct Lifecycle {
    state: SessionState,
    session: Option<Session>,
    display: Option<PairingDisplay>,
    disconnecting: bool,
    last_teardown: Option<TeardownCause>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session: None,
            display: None,
            disconnecting: false,
            last_teardown: None,
        }
    }
}

/// Internal shared state for the manager.
struct ManagerInner {
    options: Arc<ClientOptions>,
    connector: Arc<dyn Connector>,
    /// Set once initialization succeeds.
    client: RwLock<Option<Arc<dyn ProtocolClient>>>,
    lifecycle: Mutex<Lifecycle>,
    store: Arc<dyn SessionStore>,
    log: Arc<dyn ActivityLog>,
    relay_connected: AtomicBool,
}

// ============================================================================
// Pairing
// ============================================================================

/// A pairing attempt awaiting the wallet.
///
/// The URI is available immediately; [`Pairing::wait`] yields the outcome.
/// Dropping the handle does not cancel the attempt.
pub struct Pairing {
    /// Pairing URI.
    pub uri: String,
    /// Wallet deep link for the URI.
    pub deep_link: String,
    outcome: oneshot::Receiver<Result<Session>>,
}

impl Pairing {
    /// Waits for approval, rejection or timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ApprovalRejected`] if the wallet declined
    /// - [`Error::ApprovalTimeout`] if the proposal expired
    pub async fn wait(self) -> Result<Session> {
        self.outcome.await?
    }
}

impl fmt::Debug for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pairing")
            .field("uri", &self.uri)
            .field("deep_link", &self.deep_link)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Session lifecycle manager.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

/// Non-owning handle held by event subscriptions.
#[derive(Clone)]
pub(crate) struct WeakManager(Weak<ManagerInner>);

impl WeakManager {
    /// Returns the manager if it is still alive.
    pub(crate) fn upgrade(&self) -> Option<SessionManager> {
        self.0.upgrade().map(|inner| SessionManager { inner })
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lifecycle.lock();
        f.debug_struct("SessionManager")
            .field("state", &lifecycle.state)
            .field("topic", &lifecycle.session.as_ref().map(|s| &s.topic))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionManager - Constructor & Accessors
// ============================================================================

impl SessionManager {
    /// Creates an uninitialized manager.
    #[must_use]
    pub fn new(
        options: Arc<ClientOptions>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn SessionStore>,
        log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                options,
                connector,
                client: RwLock::new(None),
                lifecycle: Mutex::new(Lifecycle::default()),
                store,
                log,
                relay_connected: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.lock().state
    }

    /// Returns the held session snapshot without checking liveness.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.lifecycle.lock().session.clone()
    }

    /// Returns the held session topic without checking liveness.
    #[must_use]
    pub fn topic(&self) -> Option<Topic> {
        self.inner
            .lifecycle
            .lock()
            .session
            .as_ref()
            .map(|s| s.topic.clone())
    }

    /// Returns the pairing artifacts currently on display.
    #[must_use]
    pub fn display(&self) -> Option<PairingDisplay> {
        self.inner.lifecycle.lock().display.clone()
    }

    /// Returns why the last session ended.
    #[must_use]
    pub fn last_teardown(&self) -> Option<TeardownCause> {
        self.inner.lifecycle.lock().last_teardown
    }

    /// Returns the relay transport flag. Informational only.
    #[inline]
    #[must_use]
    pub fn is_relay_connected(&self) -> bool {
        self.inner.relay_connected.load(Ordering::SeqCst)
    }

    /// Returns the client options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the protocol client, failing before initialization.
    pub(crate) fn client(&self) -> Result<Arc<dyn ProtocolClient>> {
        self.inner.client.read().clone().ok_or_else(Error::not_initialized)
    }

    /// Appends a line to the activity log.
    #[inline]
    pub(crate) fn narrate(&self, line: &str) {
        self.inner.log.append(line);
    }

    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager(Arc::downgrade(&self.inner))
    }
}

// ============================================================================
// SessionManager - Initialization
// ============================================================================

impl SessionManager {
    /// Obtains the protocol client and restores any persisted session.
    ///
    /// A persisted topic whose session is still live and unexpired restores
    /// straight to [`SessionState::Connected`] without pairing. Otherwise the
    /// reference is cleared and the manager ends [`SessionState::Idle`].
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] if the protocol client cannot be
    ///   built; the manager returns to `Uninitialized` and may be retried
    /// - [`Error::InvalidState`] if already initialized or initializing
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state != SessionState::Uninitialized {
                warn!(state = %lifecycle.state, "Initialize called on a ready manager");
                return Err(Error::invalid_state("initialize", lifecycle.state));
            }
            lifecycle.state = SessionState::Initializing;
        }

        self.narrate("Initializing Wallet Connect Client");

        let client = match self.inner.connector.init(&self.inner.options.init).await {
            Ok(client) => client,
            Err(e) => {
                self.inner.lifecycle.lock().state = SessionState::Uninitialized;
                let err = match e {
                    Error::InitializationFailure { .. } => e,
                    other => Error::initialization(other.to_string()),
                };
                error!(error = %err, "Protocol client initialization failed");
                self.narrate(&format!("❌ Failed to initialize: {err}"));
                return Err(err);
            }
        };

        *self.inner.client.write() = Some(Arc::clone(&client));
        self.inner
            .relay_connected
            .store(client.is_relay_connected(), Ordering::SeqCst);

        EventRouter::attach(self, client.as_ref());
        self.narrate("Initialized");
        info!(
            project_id = %self.inner.options.init.project_id,
            "Protocol client initialized"
        );

        self.restore(client.as_ref());
        Ok(())
    }

    /// Restores the persisted session, or clears a dead reference.
    fn restore(&self, client: &dyn ProtocolClient) {
        let stored = self.inner.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read persisted session");
            self.narrate(&format!("Could not read stored session: {e}"));
            None
        });

        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.state = SessionState::Idle;

        let Some(topic) = stored else {
            debug!("No persisted session");
            return;
        };

        match client.session(&topic) {
            Some(session) if !session.is_expired() => {
                lifecycle.state = SessionState::Connected;
                lifecycle.session = Some(session);
                drop(lifecycle);

                info!(%topic, "Session restored");
                self.narrate("Restored session from local storage");
                self.narrate(&format!("Connected. Topic is {topic}"));
            }
            found => {
                let reason = if found.is_some() { "expired" } else { "not found" };
                let found = found.is_some();
                self.clear_store();
                lifecycle.last_teardown = Some(TeardownCause::Stale);
                drop(lifecycle);

                info!(%topic, reason, "Discarded persisted session");
                if found {
                    self.narrate("Session has expired.");
                } else {
                    self.narrate("Session is not connected.");
                }
            }
        }
    }
}

// ============================================================================
// SessionManager - Pairing
// ============================================================================

impl SessionManager {
    /// Starts pairing and returns the URI without waiting for approval.
    ///
    /// Approval is awaited on a background task. On approval the session is
    /// held and persisted; on rejection or timeout the manager returns to
    /// `Idle` and the display is cleared.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] before initialization
    /// - [`Error::PairingInProgress`] while another attempt is pending
    /// - [`Error::InvalidState`] when connected
    /// - [`Error::PairingFailed`] if no URI could be generated
    pub async fn begin_pairing(&self) -> Result<Pairing> {
        let client = self.client()?;

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                SessionState::Idle => lifecycle.state = SessionState::Pairing,
                SessionState::Pairing => {
                    drop(lifecycle);
                    warn!("Pairing requested while another is pending");
                    self.narrate("Already awaiting approval (click once)");
                    return Err(Error::PairingInProgress);
                }
                state => {
                    drop(lifecycle);
                    warn!(%state, "Pairing requested outside idle");
                    self.narrate(&format!("Cannot pair while {state}"));
                    return Err(Error::invalid_state("begin pairing", state));
                }
            }
        }

        let PairingProposal { uri, approval } =
            match client.connect(&self.inner.options.capabilities).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    self.reset_pairing();
                    let err = match e {
                        Error::PairingFailed { .. } => e,
                        other => Error::pairing_failed(other.to_string()),
                    };
                    warn!(error = %err, "Pairing URI generation failed");
                    self.narrate(&format!("❌ Failed to generate URL: {err}"));
                    return Err(err);
                }
            };

        match PairingUri::parse(&uri) {
            Ok(parsed) => debug!(
                pairing_topic = %parsed.topic,
                expiry = ?parsed.expiry_timestamp,
                "Pairing URI issued"
            ),
            Err(e) => warn!(error = %e, "Pairing URI is not a wc: URI"),
        }

        let display = PairingDisplay {
            deep_link: deep_link(&self.inner.options.deep_link_prefix, &uri),
            uri,
        };
        self.inner.lifecycle.lock().display = Some(display.clone());

        self.narrate(&format!("Generated URL: {}", display.uri));
        self.narrate("Awaiting for approval (click once)");

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let manager = self.clone();
        tokio::spawn(async move {
            let outcome = manager.settle_pairing(approval.wait().await);
            let _ = outcome_tx.send(outcome);
        });

        Ok(Pairing {
            uri: display.uri,
            deep_link: display.deep_link,
            outcome: outcome_rx,
        })
    }

    /// Applies the approval outcome.
    fn settle_pairing(&self, outcome: Result<Session>) -> Result<Session> {
        match outcome {
            Ok(session) => {
                let topic = session.topic.clone();
                let mut lifecycle = self.inner.lifecycle.lock();
                if lifecycle.state != SessionState::Pairing {
                    let state = lifecycle.state;
                    drop(lifecycle);
                    warn!(%topic, %state, "Approval arrived outside pairing, ignored");
                    return Err(Error::invalid_state("complete pairing", state));
                }

                lifecycle.state = SessionState::Connected;
                lifecycle.session = Some(session.clone());
                lifecycle.last_teardown = None;
                let persisted = self.inner.store.save(&topic);
                drop(lifecycle);

                if let Err(e) = persisted {
                    warn!(%topic, error = %e, "Could not persist session topic");
                    self.narrate(&format!("Could not persist session topic: {e}"));
                }

                info!(%topic, expiry = session.expiry, "Session connected");
                self.narrate("Got approval");
                self.narrate(&format!("Connected. Topic is {topic}"));
                self.narrate(&render(&session));
                Ok(session)
            }
            Err(e) => {
                let err = match e {
                    Error::ApprovalRejected { .. } | Error::ApprovalTimeout => e,
                    other => Error::approval_rejected(other.to_string()),
                };
                self.reset_pairing();

                warn!(error = %err, "Pairing not approved");
                self.narrate("Approval was rejected:");
                self.narrate(&describe(&err));
                Err(err)
            }
        }
    }

    /// Returns from `Pairing` to `Idle` and clears the display.
    fn reset_pairing(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state == SessionState::Pairing {
            lifecycle.state = SessionState::Idle;
        }
        lifecycle.display = None;
    }
}

// ============================================================================
// SessionManager - Liveness
// ============================================================================

impl SessionManager {
    /// Returns `true` if a session is held and still live in the registry.
    ///
    /// A held session that the registry no longer knows, or that expired, is
    /// torn down here: the reference is cleared and the manager ends `Idle`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.live_session().is_ok()
    }

    /// Returns the held session after re-checking it against the registry.
    ///
    /// The snapshot is refreshed from the registry on success. A stale
    /// session is torn down before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] before initialization
    /// - [`Error::NoActiveSession`] if no session is held
    /// - [`Error::StaleSession`] if the held session was stale and has been
    ///   cleared
    pub fn live_session(&self) -> Result<Session> {
        let client = self.client()?;

        let mut lifecycle = self.inner.lifecycle.lock();
        let Some(topic) = lifecycle.session.as_ref().map(|s| s.topic.clone()) else {
            drop(lifecycle);
            self.narrate("No session topic is set.");
            return Err(Error::NoActiveSession);
        };

        match client.session(&topic) {
            Some(live) if !live.is_expired() => {
                lifecycle.session = Some(live.clone());
                drop(lifecycle);
                self.narrate("Session is still connected and valid.");
                Ok(live)
            }
            found => {
                self.teardown_locked(&mut lifecycle, TeardownCause::Stale);
                drop(lifecycle);

                info!(%topic, expired = found.is_some(), "Held session is stale");
                if found.is_some() {
                    self.narrate("Session has expired.");
                } else {
                    self.narrate("Session is not connected.");
                }
                Err(Error::StaleSession { topic })
            }
        }
    }

    /// Returns the protocol client and the live session for a request.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] before initialization
    /// - [`Error::NoActiveSession`] if no live session is held, including
    ///   one that was just found stale
    pub(crate) fn active_session(&self) -> Result<(Arc<dyn ProtocolClient>, Session)> {
        let client = self.client()?;
        match self.live_session() {
            Ok(session) => Ok((client, session)),
            Err(Error::StaleSession { .. }) => Err(Error::NoActiveSession),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// SessionManager - Teardown
// ============================================================================

impl SessionManager {
    /// Disconnects the held session.
    ///
    /// Local state and the persisted reference are cleared even when the
    /// remote teardown fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] before initialization
    /// - [`Error::DisconnectInProgress`] while another disconnect runs
    /// - [`Error::InvalidState`] when not connected
    /// - [`Error::DisconnectFailed`] if the remote call failed (local state
    ///   is cleared regardless)
    pub async fn disconnect(&self, reason: DisconnectReason) -> Result<()> {
        let client = self.client()?;

        let topic = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.disconnecting {
                drop(lifecycle);
                warn!("Disconnect requested while another is in flight");
                return Err(Error::DisconnectInProgress);
            }
            match (lifecycle.state, lifecycle.session.as_ref()) {
                (SessionState::Connected, Some(session)) => {
                    let topic = session.topic.clone();
                    lifecycle.disconnecting = true;
                    topic
                }
                (state, _) => {
                    drop(lifecycle);
                    self.narrate("sessionTopic is empty");
                    return Err(Error::invalid_state("disconnect", state));
                }
            }
        };

        self.narrate("App will call disconnect");
        let result = client.disconnect(&topic, &reason).await;

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.disconnecting = false;
            // An event may have ended this session, or a new one may be held.
            if lifecycle.session.as_ref().is_some_and(|s| s.topic == topic) {
                self.teardown_locked(&mut lifecycle, TeardownCause::Disconnected);
            }
        }

        match result {
            Ok(()) => {
                info!(%topic, code = reason.code, "Session disconnected");
                self.narrate("Successfully logged out");
                Ok(())
            }
            Err(e) => {
                warn!(%topic, error = %e, "Remote disconnect failed, local state cleared");
                self.narrate("Failed to log out:");
                self.narrate(&describe(&e));
                Err(Error::disconnect_failed(e.to_string()))
            }
        }
    }

    /// Ends the held session in response to a notification.
    ///
    /// With `topic` set, only a matching session is ended. Returns `true` if
    /// a session was ended; ending nothing is a no-op.
    pub(crate) fn end_session(&self, topic: Option<&Topic>, cause: TeardownCause) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        let Some(held) = lifecycle.session.as_ref() else {
            return false;
        };
        if let Some(topic) = topic
            && *topic != held.topic
        {
            debug!(%topic, held = %held.topic, "Teardown for another session ignored");
            return false;
        }

        let ended = self.teardown_locked(&mut lifecycle, cause);
        drop(lifecycle);

        if let Some(topic) = ended {
            info!(%topic, ?cause, "Session ended by notification");
        }
        true
    }

    /// Records relay connectivity.
    pub(crate) fn set_relay_connected(&self, connected: bool) {
        self.inner.relay_connected.store(connected, Ordering::SeqCst);
    }

    /// Drops the held session, display and persisted reference.
    fn teardown_locked(&self, lifecycle: &mut Lifecycle, cause: TeardownCause) -> Option<Topic> {
        let topic = lifecycle.session.take().map(|s| s.topic);
        lifecycle.display = None;
        if lifecycle.state == SessionState::Connected {
            lifecycle.state = SessionState::Idle;
        }
        lifecycle.last_teardown = Some(cause);
        self.clear_store();
        topic
    }

    fn clear_store(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Could not clear persisted session");
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Renders an error for the activity log.
///
/// Structured errors show their payload; others their message.
pub(crate) fn describe(err: &Error) -> String {
    match err.data() {
        Some(data) => format!("{err}\n{}", render_pretty(data)),
        None => err.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
