//! Notification routing.
//!
//! One handler is registered with the protocol client at initialization.
//! Every notification is narrated to the activity log; a few also mutate
//! session state.
//!
//! # Routes
//!
//! | Event | Effect |
//! |-------|--------|
//! | `session_delete` | Tear down the matching session |
//! | `session_expire` | Tear down the matching session |
//! | `relayer_connect` | Set the relay flag |
//! | `relayer_disconnect` | Clear the relay flag |
//! | everything else | Log only |
//!
//! The router never dispatches requests.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::activity::render;
use crate::protocol::{ClientEvent, EventKind, ProtocolClient};
use crate::session::{SessionManager, TeardownCause};

// ============================================================================
// Types
// ============================================================================

/// State change applied for an event.
type Mutation = fn(&SessionManager, &ClientEvent);

/// Table entry for one event kind.
#[derive(Clone, Copy)]
struct Route {
    label: &'static str,
    mutation: Option<Mutation>,
}

/// Routing table, built once.
static ROUTES: LazyLock<FxHashMap<EventKind, Route>> = LazyLock::new(|| {
    EventKind::ALL
        .into_iter()
        .map(|kind| (kind, route_for(kind)))
        .collect()
});

fn route_for(kind: EventKind) -> Route {
    let (label, mutation): (&'static str, Option<Mutation>) = match kind {
        EventKind::SessionProposal => ("Session proposal received", None),
        EventKind::SessionUpdate => ("Session update received", None),
        EventKind::SessionExtend => ("Session extend received", None),
        EventKind::SessionPing => ("Session ping received", None),
        EventKind::SessionDelete => ("Session delete received", Some(on_delete as Mutation)),
        EventKind::SessionExpire => ("Session expire received", Some(on_expire as Mutation)),
        EventKind::SessionRequest => ("Session request received", None),
        EventKind::SessionRequestSent => ("Session request sent", None),
        EventKind::SessionEvent => ("Session event received", None),
        EventKind::SessionAuthenticate => ("Session authenticate received", None),
        EventKind::ProposalExpire => ("Proposal expire received", None),
        EventKind::SessionRequestExpire => ("Session request expire received", None),
        EventKind::RelayerConnect => ("Relay connected", Some(on_relay_connect as Mutation)),
        EventKind::RelayerDisconnect => ("Relay disconnected", Some(on_relay_disconnect as Mutation)),
    };
    Route { label, mutation }
}

fn on_delete(manager: &SessionManager, event: &ClientEvent) {
    manager.end_session(event.topic().as_ref(), TeardownCause::Deleted);
}

fn on_expire(manager: &SessionManager, event: &ClientEvent) {
    manager.end_session(event.topic().as_ref(), TeardownCause::Expired);
}

fn on_relay_connect(manager: &SessionManager, _event: &ClientEvent) {
    manager.set_relay_connected(true);
}

fn on_relay_disconnect(manager: &SessionManager, _event: &ClientEvent) {
    manager.set_relay_connected(false);
}

// ============================================================================
// EventRouter
// ============================================================================

/// Routes protocol client notifications into the session manager.
pub struct EventRouter;

impl EventRouter {
    /// Subscribes the manager to every notification of `client`.
    ///
    /// The subscription holds a weak reference; events arriving after the
    /// manager is dropped are discarded.
    pub fn attach(manager: &SessionManager, client: &dyn ProtocolClient) {
        let weak = manager.downgrade();
        client.subscribe(Box::new(move |event| match weak.upgrade() {
            Some(manager) => Self::route(&manager, &event),
            None => trace!(kind = %event.kind, "Event after manager dropped"),
        }));
        debug!(kinds = EventKind::ALL.len(), "Subscribed to protocol client events");
    }

    /// Narrates `event` and applies its state change, if any.
    pub fn route(manager: &SessionManager, event: &ClientEvent) {
        let Some(route) = ROUTES.get(&event.kind).copied() else {
            return;
        };

        debug!(kind = %event.kind, topic = ?event.topic(), "Event received");
        manager.narrate("");
        manager.narrate(&format!("{}: {}", route.label, render(&event.payload)));

        if let Some(mutation) = route.mutation {
            mutation(manager, event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    use crate::activity::MemoryLog;
    use crate::client::ClientOptions;
    use crate::session::MemorySessionStore;
    use crate::testing::{MockClient, MockConnector};

    fn manager(log: Arc<MemoryLog>) -> SessionManager {
        let client = Arc::new(MockClient::new());
        SessionManager::new(
            Arc::new(ClientOptions::new("test-project")),
            Arc::new(MockConnector::new(client)),
            Arc::new(MemorySessionStore::new()),
            log,
        )
    }

    #[test]
    fn test_every_kind_has_a_route() {
        for kind in EventKind::ALL {
            assert!(ROUTES.contains_key(&kind), "{kind} unrouted");
        }
    }

    #[test]
    fn test_only_teardown_and_relay_events_mutate() {
        let mutating: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|kind| ROUTES[kind].mutation.is_some())
            .collect();
        assert_eq!(
            mutating,
            [
                EventKind::SessionDelete,
                EventKind::SessionExpire,
                EventKind::RelayerConnect,
                EventKind::RelayerDisconnect,
            ]
        );
    }

    #[test]
    fn test_route_narrates_payload() {
        let log = Arc::new(MemoryLog::new());
        let manager = manager(log.clone());

        EventRouter::route(
            &manager,
            &ClientEvent::new(EventKind::SessionPing, json!({"id": 7, "topic": "T1"})),
        );

        assert!(log.contains("Session ping received: {\"id\":7,\"topic\":\"T1\"}"));
    }

    #[test]
    fn test_relay_events_toggle_flag() {
        let manager = manager(Arc::new(MemoryLog::new()));

        EventRouter::route(&manager, &ClientEvent::new(EventKind::RelayerConnect, json!({})));
        assert!(manager.is_relay_connected());

        EventRouter::route(
            &manager,
            &ClientEvent::new(EventKind::RelayerDisconnect, json!({})),
        );
        assert!(!manager.is_relay_connected());
    }

    #[test]
    fn test_delete_without_session_is_noop() {
        let manager = manager(Arc::new(MemoryLog::new()));
        EventRouter::route(
            &manager,
            &ClientEvent::new(EventKind::SessionDelete, json!({"topic": "T1"})),
        );
        assert_eq!(manager.last_teardown(), None);
    }
}
