//! Inbound notifications from the protocol client.
//!
//! # Event Types
//!
//! | Scope | Events |
//! |-------|--------|
//! | Proposal | `session_proposal`, `proposal_expire` |
//! | Session | `session_update`, `session_extend`, `session_ping`, `session_delete`, `session_expire`, `session_event`, `session_authenticate` |
//! | Request | `session_request`, `session_request_sent`, `session_request_expire` |
//! | Relay | `relayer_connect`, `relayer_disconnect` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::identifiers::Topic;

// ============================================================================
// EventKind
// ============================================================================

/// Every notification the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Session proposal received.
    SessionProposal,
    /// Session namespaces updated.
    SessionUpdate,
    /// Session expiry extended.
    SessionExtend,
    /// Keep-alive ping.
    SessionPing,
    /// Session deleted by the peer.
    SessionDelete,
    /// Session expired.
    SessionExpire,
    /// Inbound method request from the peer.
    SessionRequest,
    /// Outbound request acknowledged by the relay.
    SessionRequestSent,
    /// Session-scoped custom event.
    SessionEvent,
    /// Authentication challenge.
    SessionAuthenticate,
    /// Pairing proposal expired.
    ProposalExpire,
    /// Outbound request expired.
    SessionRequestExpire,
    /// Relay transport connected.
    RelayerConnect,
    /// Relay transport disconnected.
    RelayerDisconnect,
}

impl EventKind {
    /// Every event kind, in subscription order.
    pub const ALL: [EventKind; 14] = [
        EventKind::SessionProposal,
        EventKind::SessionUpdate,
        EventKind::SessionExtend,
        EventKind::SessionPing,
        EventKind::SessionDelete,
        EventKind::SessionExpire,
        EventKind::SessionRequest,
        EventKind::SessionRequestSent,
        EventKind::SessionEvent,
        EventKind::SessionAuthenticate,
        EventKind::ProposalExpire,
        EventKind::SessionRequestExpire,
        EventKind::RelayerConnect,
        EventKind::RelayerDisconnect,
    ];

    /// Returns the wire name of the event.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SessionProposal => "session_proposal",
            Self::SessionUpdate => "session_update",
            Self::SessionExtend => "session_extend",
            Self::SessionPing => "session_ping",
            Self::SessionDelete => "session_delete",
            Self::SessionExpire => "session_expire",
            Self::SessionRequest => "session_request",
            Self::SessionRequestSent => "session_request_sent",
            Self::SessionEvent => "session_event",
            Self::SessionAuthenticate => "session_authenticate",
            Self::ProposalExpire => "proposal_expire",
            Self::SessionRequestExpire => "session_request_expire",
            Self::RelayerConnect => "relayer_connect",
            Self::RelayerDisconnect => "relayer_disconnect",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns `true` for relay transport signals.
    #[inline]
    #[must_use]
    pub fn is_transport(self) -> bool {
        matches!(self, Self::RelayerConnect | Self::RelayerDisconnect)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ClientEvent
// ============================================================================

/// A notification with its event-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Event payload as delivered by the protocol client.
    pub payload: Value,
}

impl ClientEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Returns the session topic the event refers to, if any.
    #[must_use]
    pub fn topic(&self) -> Option<Topic> {
        self.payload
            .get("topic")
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
    use serde_json::json;

    #[test]
    fn test_name_round_trip_for_all_kinds() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("session_unknown"), None);
    }

    #[test]
    fn test_transport_kinds() {
        let transport: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|k| k.is_transport())
            .collect();
        assert_eq!(
            transport,
            [EventKind::RelayerConnect, EventKind::RelayerDisconnect]
        );
    }

    #[test]
    fn test_event_topic() {
        let event = ClientEvent::new(EventKind::SessionDelete, json!({"id": 1, "topic": "T1"}));
        assert_eq!(event.topic(), Some(Topic::from("T1")));

        let event = ClientEvent::new(EventKind::RelayerConnect, Value::Null);
        assert_eq!(event.topic(), None);
    }
}
