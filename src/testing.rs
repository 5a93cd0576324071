//! In-process protocol client double for unit tests.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{Notify, oneshot};

use crate::error::{Error, Result};
use crate::identifiers::Topic;
use crate::protocol::{
    Approval, CapabilityRequest, ClientEvent, Connector, DisconnectReason, EventHandler,
    InitConfig, PairingProposal, ProtocolClient, SessionRequest, unix_now,
};
use crate::session::Session;

type SharedHandler = Arc<dyn Fn(ClientEvent) + Send + Sync>;

// ============================================================================
// MockClient
// ============================================================================

/// Scriptable [`ProtocolClient`] with an in-memory registry.
#[derive(Default)]
pub(crate) struct MockClient {
    registry: Mutex<FxHashMap<Topic, Session>>,
    handlers: Mutex<Vec<SharedHandler>>,
    approval: Mutex<Option<oneshot::Sender<Result<Session>>>>,
    connect_calls: AtomicUsize,
    connect_failure: Mutex<Option<Error>>,
    requests: Mutex<Vec<SessionRequest>>,
    responses: Mutex<VecDeque<Result<Value>>>,
    disconnects: Mutex<Vec<(Topic, i64)>>,
    disconnect_failure: Mutex<Option<Error>>,
    disconnect_gate: Mutex<Option<Arc<Notify>>>,
    disconnect_entered: Notify,
    relay_down: AtomicBool,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_session(&self, session: Session) {
        self.registry.lock().insert(session.topic.clone(), session);
    }

    pub(crate) fn remove_session(&self, topic: &Topic) {
        self.registry.lock().remove(topic);
    }

    /// Resolves the pending approval with `session` and registers it.
    pub(crate) fn approve(&self, session: Session) {
        self.insert_session(session.clone());
        if let Some(tx) = self.approval.lock().take() {
            let _ = tx.send(Ok(session));
        }
    }

    /// Resolves the pending approval with `err`.
    pub(crate) fn reject(&self, err: Error) {
        if let Some(tx) = self.approval.lock().take() {
            let _ = tx.send(Err(err));
        }
    }

    pub(crate) fn fail_next_connect(&self, err: Error) {
        *self.connect_failure.lock() = Some(err);
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Queues the result of the next request. Unscripted requests return `null`.
    pub(crate) fn respond_with(&self, result: Result<Value>) {
        self.responses.lock().push_back(result);
    }

    pub(crate) fn request_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn last_request(&self) -> Option<SessionRequest> {
        self.requests.lock().last().cloned()
    }

    pub(crate) fn disconnects(&self) -> Vec<(Topic, i64)> {
        self.disconnects.lock().clone()
    }

    pub(crate) fn fail_next_disconnect(&self, err: Error) {
        *self.disconnect_failure.lock() = Some(err);
    }

    /// Makes disconnects block until the returned gate is notified.
    pub(crate) fn hold_disconnects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.disconnect_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Waits until a disconnect call has started.
    pub(crate) async fn wait_for_disconnect_call(&self) {
        self.disconnect_entered.notified().await;
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Delivers `event` to every subscriber.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let handlers = self.handlers.lock().clone();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn connect(&self, _capabilities: &CapabilityRequest) -> Result<PairingProposal> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.connect_failure.lock().take() {
            return Err(err);
        }

        let (tx, rx) = oneshot::channel();
        *self.approval.lock() = Some(tx);

        let topic = uuid::Uuid::new_v4().simple().to_string();
        Ok(PairingProposal {
            uri: format!(
                "wc:{topic}@2?relay-protocol=irn&symKey=00ff&expiryTimestamp={}",
                unix_now() + 300
            ),
            approval: Approval::from_receiver(rx),
        })
    }

    async fn request(&self, request: SessionRequest) -> Result<Value> {
        self.requests.lock().push(request);
        self.responses.lock().pop_front().unwrap_or(Ok(Value::Null))
    }

    async fn disconnect(&self, topic: &Topic, reason: &DisconnectReason) -> Result<()> {
        self.disconnects.lock().push((topic.clone(), reason.code));
        self.disconnect_entered.notify_one();

        let gate = self.disconnect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(err) = self.disconnect_failure.lock().take() {
            return Err(err);
        }
        self.remove_session(topic);
        Ok(())
    }

    fn session(&self, topic: &Topic) -> Option<Session> {
        self.registry.lock().get(topic).cloned()
    }

    fn sessions(&self) -> Vec<Session> {
        self.registry.lock().values().cloned().collect()
    }

    fn subscribe(&self, handler: EventHandler) {
        self.handlers.lock().push(Arc::from(handler));
    }

    fn is_relay_connected(&self) -> bool {
        !self.relay_down.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// Hands out a shared [`MockClient`], optionally failing the first attempts.
pub(crate) struct MockConnector {
    client: Arc<MockClient>,
    failures_left: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new(client: Arc<MockClient>) -> Self {
        Self::failing(client, 0)
    }

    pub(crate) fn failing(client: Arc<MockClient>, failures: usize) -> Self {
        Self {
            client,
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn init(&self, config: &InitConfig) -> Result<Arc<dyn ProtocolClient>> {
        if config.project_id.is_empty() {
            return Err(Error::initialization("project id is empty"));
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::connection("relay unreachable"));
        }
        let client: Arc<dyn ProtocolClient> = self.client.clone();
        Ok(client)
    }
}
