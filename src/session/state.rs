//! Session data and lifecycle states.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::{ChainId, Topic};
use crate::protocol::{Method, unix_now};

// ============================================================================
// Session
// ============================================================================

/// An authorized, time-bounded relationship with a wallet.
///
/// Snapshots are owned by the protocol client's registry; the manager only
/// observes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session topic.
    pub topic: Topic,
    /// Expiry, Unix seconds.
    pub expiry: u64,
    /// Approved namespaces.
    #[serde(default)]
    pub namespaces: BTreeMap<String, SessionNamespace>,
    /// Topic of the pairing the session was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<Topic>,
}

/// Capabilities the wallet approved within one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNamespace {
    /// Approved chains.
    #[serde(default)]
    pub chains: Vec<ChainId>,
    /// Accounts in `namespace:reference:address` form.
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Approved methods.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Approved events.
    #[serde(default)]
    pub events: Vec<String>,
}

impl Session {
    /// Creates a session with no namespaces.
    #[must_use]
    pub fn new(topic: Topic, expiry: u64) -> Self {
        Self {
            topic,
            expiry,
            namespaces: BTreeMap::new(),
            pairing_topic: None,
        }
    }

    /// Adds an approved namespace.
    #[must_use]
    pub fn with_namespace(mut self, name: impl Into<String>, namespace: SessionNamespace) -> Self {
        self.namespaces.insert(name.into(), namespace);
        self
    }

    /// Returns `true` if the session expired at or before `now` (Unix seconds).
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry <= now
    }

    /// Returns `true` if the session has expired.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Returns the chain the session is scoped to.
    ///
    /// Taken from the first approved chain, or derived from the first
    /// account when the wallet only listed accounts.
    #[must_use]
    pub fn chain_id(&self) -> Option<ChainId> {
        let namespaces = || self.namespaces.values();

        namespaces()
            .find_map(|ns| ns.chains.first().cloned())
            .or_else(|| {
                namespaces()
                    .flat_map(|ns| ns.accounts.iter())
                    .find_map(|account| {
                        let mut parts = account.splitn(3, ':');
                        match (parts.next(), parts.next(), parts.next()) {
                            (Some(ns), Some(reference), Some(_)) => {
                                Some(ChainId::new(format!("{ns}:{reference}")))
                            }
                            _ => None,
                        }
                    })
            })
    }

    /// Iterates over every approved method name.
    pub fn approved_methods(&self) -> impl Iterator<Item = &str> {
        self.namespaces
            .values()
            .flat_map(|ns| ns.methods.iter().map(String::as_str))
    }

    /// Returns `true` if the wallet approved `method`.
    #[must_use]
    pub fn allows(&self, method: Method) -> bool {
        self.approved_methods().any(|m| m == method.as_str())
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No protocol client yet.
    Uninitialized,
    /// Protocol client is being constructed.
    Initializing,
    /// Ready, no session.
    Idle,
    /// A pairing URI was issued and approval is pending.
    Pairing,
    /// A session is held.
    Connected,
}

impl SessionState {
    /// Returns `true` once the protocol client is ready.
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Idle | Self::Pairing | Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Pairing => "pairing",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TeardownCause
// ============================================================================

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownCause {
    /// Local disconnect.
    Disconnected,
    /// The wallet deleted the session.
    Deleted,
    /// The protocol client reported expiry.
    Expired,
    /// A liveness check found the session gone or expired.
    Stale,
}

// ============================================================================
// PairingDisplay
// ============================================================================

/// Pairing artifacts a shell may display (URI text, QR source, deep link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingDisplay {
    /// Pairing URI.
    pub uri: String,
    /// Wallet deep link.
    pub deep_link: String,
}

// ============================================================================
// Tests
// ============================================================================
