//! Protocol client backed by a local bridge process.
//!
//! The bridge hosts the relay SDK and speaks the frames in
//! [`super::frame`]. [`BridgeClient`] mirrors the bridge's session registry
//! locally so liveness checks stay synchronous.
//!
//! # Registry Updates
//!
//! | Source | Effect |
//! |--------|--------|
//! | `session.getAll` at init | Seed |
//! | `pairing.approved` | Insert approved session |
//! | `session_update`, `session_extend` | Replace snapshot, or bump expiry |
//! | `session_delete`, `session_expire` | Remove |
//! | successful `client.disconnect` | Remove |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Topic;
use crate::protocol::{
    Approval, CapabilityRequest, ClientEvent, Connector, DisconnectReason, EventHandler,
    EventKind, InitConfig, PairingProposal, PairingUri, ProtocolClient, SessionRequest,
};
use crate::session::Session;

use super::connection::{Connection, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_PENDING, Inbound};
use super::frame::{
    BridgeEvent, BridgeRequest, EVENT_PAIRING_APPROVED, EVENT_PAIRING_REJECTED, METHOD_CONNECT,
    METHOD_INIT, METHOD_REQUEST, METHOD_SESSIONS,
};

// ============================================================================
// Constants
// ============================================================================

/// Wallet requests wait for a human, so they get a longer budget.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcomes held for `client.connect` calls that have not returned yet.
const MAX_PARKED_OUTCOMES: usize = 16;

// ============================================================================
// Types
// ============================================================================

type SharedHandler = Arc<dyn Fn(ClientEvent) + Send + Sync>;

type ApprovalSender = oneshot::Sender<Result<Session>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitResult {
    #[serde(default = "default_true")]
    relay_connected: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ConnectResult {
    uri: String,
}

// ============================================================================
// Approvals
// ============================================================================

/// Pairing waiters keyed by pairing topic.
///
/// A `None` key belongs to a pairing whose URI did not parse. An outcome can
/// reach the event loop before `client.connect` has returned its URI; while a
/// connect is in flight such outcomes are parked until the waiter registers.
#[derive(Default)]
struct Approvals {
    waiters: FxHashMap<Option<Topic>, ApprovalSender>,
    parked: FxHashMap<Option<Topic>, Result<Session>>,
    connecting: usize,
}

impl Approvals {
    fn begin_connect(&mut self) {
        self.connecting += 1;
    }

    fn end_connect(&mut self) {
        self.connecting = self.connecting.saturating_sub(1);
        if self.connecting == 0 && !self.parked.is_empty() {
            debug!(count = self.parked.len(), "Dropping unclaimed pairing outcomes");
            self.parked.clear();
        }
    }

    /// Registers a waiter, settling it at once if its outcome is parked.
    fn register(&mut self, key: Option<Topic>, tx: ApprovalSender) {
        let parked = match key {
            Some(_) => self.parked.remove(&key).or_else(|| self.take_lone_parked(true)),
            None => self.take_lone_parked(false),
        };
        if let Some(outcome) = parked {
            debug!(pairing_topic = ?key, "Settling approval from parked outcome");
            let _ = tx.send(outcome);
            return;
        }

        if self.waiters.insert(key.clone(), tx).is_some() {
            warn!(pairing_topic = ?key, "Replaced an existing approval waiter");
        }
    }

    /// Takes the only parked outcome; with `topicless_only`, only if it has no topic.
    fn take_lone_parked(&mut self, topicless_only: bool) -> Option<Result<Session>> {
        if self.parked.len() != 1 || (topicless_only && !self.parked.contains_key(&None)) {
            return None;
        }
        self.parked.drain().next().map(|(_, outcome)| outcome)
    }

    fn take_waiter(&mut self, key: &Option<Topic>) -> Option<ApprovalSender> {
        if key.is_some()
            && let Some(tx) = self.waiters.remove(key)
        {
            return Some(tx);
        }
        // Otherwise only an unambiguous waiter can be settled.
        if self.waiters.len() == 1 && (key.is_none() || self.waiters.contains_key(&None)) {
            return self.waiters.drain().next().map(|(_, tx)| tx);
        }
        None
    }

    /// Delivers or parks `outcome`. Returns `false` if it was dropped.
    fn settle(&mut self, key: Option<Topic>, outcome: Result<Session>) -> bool {
        if let Some(tx) = self.take_waiter(&key) {
            let _ = tx.send(outcome);
            return true;
        }
        if self.connecting > 0 && self.parked.len() < MAX_PARKED_OUTCOMES {
            debug!(pairing_topic = ?key, "Parking pairing outcome until connect returns");
            self.parked.insert(key, outcome);
            return true;
        }
        false
    }

    fn close(&mut self) -> Vec<ApprovalSender> {
        self.parked.clear();
        self.waiters.drain().map(|(_, tx)| tx).collect()
    }
}

/// Marks a `client.connect` call in flight for as long as it lives.
struct ConnectInFlight<'a>(&'a Mutex<Approvals>);

impl<'a> ConnectInFlight<'a> {
    fn new(approvals: &'a Mutex<Approvals>) -> Self {
        approvals.lock().begin_connect();
        Self(approvals)
    }
}

impl Drop for ConnectInFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().end_connect();
    }
}

// ============================================================================
// BridgeConnector
// ============================================================================

/// Connects to a bridge WebSocket and initializes its protocol client.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    url: Url,
    call_timeout: Duration,
    request_timeout: Duration,
    max_pending: usize,
}

impl BridgeConnector {
    /// Creates a connector for `url` (`ws://` or `wss://`).
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Config`] for other schemes
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Bridge URL must use ws:// or wss://, got {url}"
            )));
        }
        Ok(Self {
            url,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
        })
    }

    /// Sets the timeout for bridge bookkeeping calls.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the timeout for wallet requests.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how many calls may await a response at once.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Returns the bridge URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn init(&self, config: &InitConfig) -> Result<Arc<dyn ProtocolClient>> {
        debug!(url = %self.url, "Connecting to bridge");
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::connection(format!("{}: {e}", self.url)))?;

        let client = BridgeClient::handshake(
            Connection::new(ws_stream).with_max_pending(self.max_pending),
            config,
            self.call_timeout,
            self.request_timeout,
        )
        .await?;
        info!(url = %self.url, "Bridge connected");
        let client: Arc<dyn ProtocolClient> = Arc::new(client);
        Ok(client)
    }
}

// ============================================================================
// BridgeClient
// ============================================================================

struct BridgeInner {
    connection: Connection,
    registry: RwLock<FxHashMap<Topic, Session>>,
    approvals: Mutex<Approvals>,
    handler: RwLock<Option<SharedHandler>>,
    relay_connected: AtomicBool,
    call_timeout: Duration,
    request_timeout: Duration,
}

/// [`ProtocolClient`] speaking to a bridge over one WebSocket.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<BridgeInner>,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("sessions", &self.inner.registry.read().len())
            .field("relay_connected", &self.is_relay_connected())
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Initializes the bridge over `connection` and seeds the registry.
    ///
    /// # Errors
    ///
    /// - [`Error::InitializationFailure`] if the bridge rejects `client.init`
    /// - transport errors from the connection
    pub async fn handshake(
        connection: Connection,
        config: &InitConfig,
        call_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Self {
            inner: Arc::new(BridgeInner {
                connection,
                registry: RwLock::new(FxHashMap::default()),
                approvals: Mutex::new(Approvals::default()),
                handler: RwLock::new(None),
                relay_connected: AtomicBool::new(false),
                call_timeout,
                request_timeout,
            }),
        };

        let weak = Arc::downgrade(&client.inner);
        client
            .inner
            .connection
            .set_handler(Arc::new(move |inbound| on_inbound(&weak, inbound)));

        let init = client
            .call(BridgeRequest::with_params(METHOD_INIT, config)?)
            .await
            .map_err(|e| Error::initialization(e.to_string()))?;
        let init: InitResult = serde_json::from_value(init)
            .unwrap_or(InitResult { relay_connected: true });
        client
            .inner
            .relay_connected
            .store(init.relay_connected, Ordering::SeqCst);

        let sessions: Vec<Session> = serde_json::from_value(
            client
                .call(BridgeRequest::new(METHOD_SESSIONS, json!({})))
                .await?,
        )?;
        debug!(count = sessions.len(), "Registry seeded from bridge");
        client.inner.registry.write().extend(
            sessions
                .into_iter()
                .map(|session| (session.topic.clone(), session)),
        );

        Ok(client)
    }

    async fn call(&self, request: BridgeRequest) -> Result<Value> {
        self.inner
            .connection
            .call(request, self.inner.call_timeout)
            .await
    }

    /// Shuts down the bridge connection.
    pub fn shutdown(&self) {
        self.inner.connection.shutdown();
    }
}

#[async_trait]
impl ProtocolClient for BridgeClient {
    async fn connect(&self, capabilities: &CapabilityRequest) -> Result<PairingProposal> {
        let in_flight = ConnectInFlight::new(&self.inner.approvals);

        let result = self
            .call(BridgeRequest::with_params(METHOD_CONNECT, capabilities)?)
            .await?;
        let ConnectResult { uri } = serde_json::from_value(result)?;
        let pairing_topic = match PairingUri::parse(&uri) {
            Ok(parsed) => Some(parsed.topic),
            Err(e) => {
                warn!(error = %e, "Pairing URI has no topic; matching approval by elimination");
                None
            }
        };

        let (tx, rx) = oneshot::channel();
        debug!(pairing_topic = ?pairing_topic, "Awaiting approval from bridge");
        self.inner.approvals.lock().register(pairing_topic, tx);
        drop(in_flight);

        Ok(PairingProposal {
            uri,
            approval: Approval::from_receiver(rx),
        })
    }

    async fn request(&self, request: SessionRequest) -> Result<Value> {
        let bridge_request = BridgeRequest::with_params(METHOD_REQUEST, &request)?;
        self.inner
            .connection
            .call(bridge_request, self.inner.request_timeout)
            .await
    }

    async fn disconnect(&self, topic: &Topic, reason: &DisconnectReason) -> Result<()> {
        self.call(BridgeRequest::disconnect(topic, reason)).await?;
        self.inner.registry.write().remove(topic);
        Ok(())
    }

    fn session(&self, topic: &Topic) -> Option<Session> {
        self.inner.registry.read().get(topic).cloned()
    }

    fn sessions(&self) -> Vec<Session> {
        self.inner.registry.read().values().cloned().collect()
    }

    fn subscribe(&self, handler: EventHandler) {
        *self.inner.handler.write() = Some(Arc::from(handler));
    }

    fn is_relay_connected(&self) -> bool {
        self.inner.relay_connected.load(Ordering::SeqCst) && !self.inner.connection.is_closed()
    }
}

// ============================================================================
// Inbound Handling
// ============================================================================

fn on_inbound(weak: &Weak<BridgeInner>, inbound: Inbound) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    match inbound {
        Inbound::Event(event) => inner.on_event(event),
        Inbound::Closed => inner.on_closed(),
    }
}

impl BridgeInner {
    fn on_event(&self, event: BridgeEvent) {
        match event.method.as_str() {
            EVENT_PAIRING_APPROVED => self.on_approved(&event),
            EVENT_PAIRING_REJECTED => {
                let message = event
                    .params
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("User rejected.")
                    .to_string();
                self.settle_approval(event.pairing_topic(), Err(Error::approval_rejected(message)));
            }
            name => match EventKind::from_name(name) {
                Some(kind) => {
                    let client_event = ClientEvent::new(kind, event.params);
                    self.apply(&client_event);
                    self.forward(client_event);
                }
                None => debug!(method = %name, "Unknown bridge event"),
            },
        }
    }

    fn on_approved(&self, event: &BridgeEvent) {
        let session = event
            .params
            .get("session")
            .cloned()
            .ok_or_else(|| Error::protocol("pairing.approved without session"))
            .and_then(|raw| serde_json::from_value::<Session>(raw).map_err(Error::from));

        if let Ok(session) = &session {
            self.registry
                .write()
                .insert(session.topic.clone(), session.clone());
        }

        let pairing_topic = event
            .pairing_topic()
            .or_else(|| session.as_ref().ok().and_then(|s| s.pairing_topic.clone()));
        self.settle_approval(pairing_topic, session);
    }

    fn settle_approval(&self, pairing_topic: Option<Topic>, outcome: Result<Session>) {
        if !self.approvals.lock().settle(pairing_topic, outcome) {
            warn!("Pairing outcome with no matching waiter");
        }
    }

    /// Keeps the registry in step with session notifications.
    fn apply(&self, event: &ClientEvent) {
        match event.kind {
            EventKind::SessionUpdate | EventKind::SessionExtend => {
                if let Some(session) = event
                    .payload
                    .get("session")
                    .cloned()
                    .and_then(|raw| serde_json::from_value::<Session>(raw).ok())
                {
                    self.registry
                        .write()
                        .insert(session.topic.clone(), session);
                } else if let (Some(topic), Some(expiry)) = (
                    event.topic(),
                    event.payload.get("expiry").and_then(Value::as_u64),
                ) {
                    if let Some(session) = self.registry.write().get_mut(&topic) {
                        session.expiry = expiry;
                    }
                }
            }
            EventKind::SessionDelete | EventKind::SessionExpire => {
                if let Some(topic) = event.topic() {
                    self.registry.write().remove(&topic);
                }
            }
            EventKind::ProposalExpire => {
                if let Some(topic) = event
                    .payload
                    .get("pairingTopic")
                    .and_then(Value::as_str)
                    .and_then(Topic::new)
                {
                    self.settle_approval(Some(topic), Err(Error::ApprovalTimeout));
                }
            }
            EventKind::RelayerConnect => self.relay_connected.store(true, Ordering::SeqCst),
            EventKind::RelayerDisconnect => self.relay_connected.store(false, Ordering::SeqCst),
            _ => {}
        }
    }

    /// Delivers to the subscriber without holding any lock.
    fn forward(&self, event: ClientEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn on_closed(&self) {
        warn!("Bridge connection closed");
        self.relay_connected.store(false, Ordering::SeqCst);

        let waiters = self.approvals.lock().close();
        for tx in waiters {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        self.forward(ClientEvent::new(EventKind::RelayerDisconnect, json!({})));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::protocol::unix_now;
    use crate::transport::connection::tests::{FakeBridge, next_request, pair, push};
    use crate::transport::frame::{BridgeError, BridgeResponse};

    const PAIRING_URI: &str = "wc:P1@2?relay-protocol=irn&symKey=00ff&expiryTimestamp=1718000300";

    fn session_json(topic: &str, expiry: u64) -> Value {
        json!({
            "topic": topic,
            "expiry": expiry,
            "pairingTopic": "P1",
            "namespaces": { "qubic": { "accounts": ["qubic:main:A"], "methods": ["qubic_sign"], "events": [] } }
        })
    }

    /// Answers the init handshake with the given registry.
    async fn answer_handshake(bridge: &mut FakeBridge, sessions: Value) {
        let init = next_request(bridge).await;
        assert_eq!(init.method, METHOD_INIT);
        assert_eq!(init.params["projectId"], "p");
        push(bridge, &BridgeResponse::success(init.id, json!({"relayConnected": true}))).await;

        let all = next_request(bridge).await;
        assert_eq!(all.method, METHOD_SESSIONS);
        push(bridge, &BridgeResponse::success(all.id, sessions)).await;
    }

    async fn connected(sessions: Value) -> (BridgeClient, FakeBridge) {
        let (connection, mut bridge) = pair().await;
        let config = InitConfig {
            project_id: "p".into(),
            metadata: Default::default(),
        };

        let (client, ()) = tokio::join!(
            BridgeClient::handshake(
                connection,
                &config,
                DEFAULT_CALL_TIMEOUT,
                DEFAULT_REQUEST_TIMEOUT
            ),
            answer_handshake(&mut bridge, sessions),
        );
        (client.expect("handshake"), bridge)
    }

    #[test]
    fn test_connector_rejects_http_url() {
        assert!(matches!(
            BridgeConnector::new("http://127.0.0.1:9876"),
            Err(Error::Config { .. })
        ));
        assert!(BridgeConnector::new("ws://127.0.0.1:9876").is_ok());
    }

    #[test]
    fn test_connector_options() {
        let connector = BridgeConnector::new("wss://bridge.example/ws")
            .expect("url")
            .call_timeout(Duration::from_secs(5))
            .request_timeout(Duration::from_secs(60))
            .max_pending(8);

        assert_eq!(connector.url().scheme(), "wss");
        assert_eq!(connector.call_timeout, Duration::from_secs(5));
        assert_eq!(connector.request_timeout, Duration::from_secs(60));
        assert_eq!(connector.max_pending, 8);
    }

    #[tokio::test]
    async fn test_handshake_seeds_registry() {
        let expiry = unix_now() + 3600;
        let (client, _bridge) = connected(json!([session_json("T1", expiry)])).await;

        let session = client.session(&Topic::from("T1")).expect("seeded");
        assert_eq!(session.expiry, expiry);
        assert_eq!(client.sessions().len(), 1);
        assert!(client.is_relay_connected());
    }

    #[tokio::test]
    async fn test_init_rejection_is_initialization_failure() {
        let (connection, mut bridge) = pair().await;
        let config = InitConfig {
            project_id: "p".into(),
            metadata: Default::default(),
        };

        let reject = async {
            let init = next_request(&mut bridge).await;
            let error = BridgeError {
                code: 401,
                message: "Invalid project id".into(),
                data: None,
            };
            push(&mut bridge, &BridgeResponse::failure(init.id, error)).await;
        };
        let (result, ()) = tokio::join!(
            BridgeClient::handshake(connection, &config, DEFAULT_CALL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT),
            reject,
        );

        assert!(matches!(result, Err(Error::InitializationFailure { .. })));
    }

    #[tokio::test]
    async fn test_pairing_approval_via_event() {
        let (client, mut bridge) = connected(json!([])).await;

        let capabilities = CapabilityRequest::qubic(Default::default());
        let (proposal, ()) = tokio::join!(
            client.connect(&capabilities),
            async {
                let request = next_request(&mut bridge).await;
                assert_eq!(request.method, METHOD_CONNECT);
                assert!(request.params["requiredNamespaces"]["qubic"].is_object());
                push(&mut bridge, &BridgeResponse::success(request.id, json!({"uri": PAIRING_URI}))).await;
            },
        );
        let proposal = proposal.expect("proposal");
        assert_eq!(proposal.uri, PAIRING_URI);

        let expiry = unix_now() + 3600;
        push(
            &mut bridge,
            &BridgeEvent::new(
                EVENT_PAIRING_APPROVED,
                json!({"pairingTopic": "P1", "session": session_json("T1", expiry)}),
            ),
        )
        .await;

        let session = proposal.approval.wait().await.expect("approved");
        assert_eq!(session.topic, Topic::from("T1"));
        assert!(client.session(&Topic::from("T1")).is_some());
    }

    #[tokio::test]
    async fn test_pairing_rejection_via_event() {
        let (client, mut bridge) = connected(json!([])).await;

        let capabilities = CapabilityRequest::default();
        let (proposal, ()) = tokio::join!(
            client.connect(&capabilities),
            async {
                let request = next_request(&mut bridge).await;
                push(&mut bridge, &BridgeResponse::success(request.id, json!({"uri": PAIRING_URI}))).await;
            },
        );

        push(
            &mut bridge,
            &BridgeEvent::new(EVENT_PAIRING_REJECTED, json!({"pairingTopic": "P1", "message": "User rejected."})),
        )
        .await;

        let err = proposal.expect("proposal").approval.wait().await.unwrap_err();
        assert!(matches!(err, Error::ApprovalRejected { ref message } if message == "User rejected."));
    }

    #[tokio::test]
    async fn test_delete_event_updates_registry_and_forwards() {
        let (client, mut bridge) = connected(json!([session_json("T1", unix_now() + 3600)])).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }));

        push(
            &mut bridge,
            &BridgeEvent::new("session_delete", json!({"id": 1, "topic": "T1"})),
        )
        .await;

        let event = rx.recv().await.expect("forwarded");
        assert_eq!(event.kind, EventKind::SessionDelete);
        assert!(client.session(&Topic::from("T1")).is_none());
    }

    #[tokio::test]
    async fn test_extend_event_bumps_expiry() {
        let (client, mut bridge) = connected(json!([session_json("T1", unix_now() + 60)])).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.subscribe(Box::new(move |event| {
            let _ = tx.send(event.kind);
        }));

        let extended = unix_now() + 7 * 24 * 3600;
        push(
            &mut bridge,
            &BridgeEvent::new("session_extend", json!({"topic": "T1", "expiry": extended})),
        )
        .await;

        assert_eq!(rx.recv().await, Some(EventKind::SessionExtend));
        assert_eq!(client.session(&Topic::from("T1")).map(|s| s.expiry), Some(extended));
    }

    #[tokio::test]
    async fn test_request_error_keeps_code() {
        let (client, mut bridge) = connected(json!([])).await;
        let request = SessionRequest {
            topic: Topic::from("T1"),
            chain_id: Default::default(),
            request: crate::protocol::RequestEnvelope {
                method: "qubic_sign".into(),
                params: json!({"from": "A", "message": "hi"}),
            },
        };

        let (result, ()) = tokio::join!(client.request(request), async {
            let sent = next_request(&mut bridge).await;
            assert_eq!(sent.method, METHOD_REQUEST);
            assert_eq!(sent.params["chainId"], "qubic:main");
            assert_eq!(sent.params["request"]["method"], "qubic_sign");
            let error = BridgeError {
                code: 5000,
                message: "User rejected.".into(),
                data: None,
            };
            push(&mut bridge, &BridgeResponse::failure(sent.id, error)).await;
        });

        assert!(matches!(result, Err(Error::Remote { code: 5000, .. })));
    }

    #[tokio::test]
    async fn test_approval_arriving_with_uri_is_kept() {
        let (client, mut bridge) = connected(json!([])).await;
        let expiry = unix_now() + 3600;

        let capabilities = CapabilityRequest::default();
        let (proposal, ()) = tokio::join!(client.connect(&capabilities), async {
            let request = next_request(&mut bridge).await;
            push(&mut bridge, &BridgeResponse::success(request.id, json!({"uri": PAIRING_URI}))).await;
            push(
                &mut bridge,
                &BridgeEvent::new(
                    EVENT_PAIRING_APPROVED,
                    json!({"pairingTopic": "P1", "session": session_json("T1", expiry)}),
                ),
            )
            .await;
        });

        let session = timeout(Duration::from_secs(2), proposal.expect("proposal").approval.wait())
            .await
            .expect("approval delivered")
            .expect("approved");
        assert_eq!(session.topic, Topic::from("T1"));
    }

    #[tokio::test]
    async fn test_unparseable_uri_still_pairs() {
        let (client, mut bridge) = connected(json!([])).await;

        let capabilities = CapabilityRequest::default();
        let (proposal, ()) = tokio::join!(client.connect(&capabilities), async {
            let request = next_request(&mut bridge).await;
            push(
                &mut bridge,
                &BridgeResponse::success(request.id, json!({"uri": "https://pair.example/abc"})),
            )
            .await;
        });
        let proposal = proposal.expect("proposal despite unparseable uri");
        assert_eq!(proposal.uri, "https://pair.example/abc");

        push(
            &mut bridge,
            &BridgeEvent::new(
                EVENT_PAIRING_APPROVED,
                json!({"pairingTopic": "P9", "session": session_json("T9", unix_now() + 3600)}),
            ),
        )
        .await;

        let session = timeout(Duration::from_secs(2), proposal.approval.wait())
            .await
            .expect("approval delivered")
            .expect("approved");
        assert_eq!(session.topic, Topic::from("T9"));
    }

    #[tokio::test]
    async fn test_proposal_expire_times_out_approval() {
        let (client, mut bridge) = connected(json!([])).await;

        let capabilities = CapabilityRequest::default();
        let (proposal, ()) = tokio::join!(client.connect(&capabilities), async {
            let request = next_request(&mut bridge).await;
            push(&mut bridge, &BridgeResponse::success(request.id, json!({"uri": PAIRING_URI}))).await;
        });

        push(
            &mut bridge,
            &BridgeEvent::new("proposal_expire", json!({"id": 7, "pairingTopic": "P1"})),
        )
        .await;

        let outcome = timeout(Duration::from_secs(2), proposal.expect("proposal").approval.wait())
            .await
            .expect("settled");
        assert!(matches!(outcome, Err(Error::ApprovalTimeout)));
    }

    #[test]
    fn test_outcome_without_connect_in_flight_is_dropped() {
        let mut approvals = Approvals::default();
        assert!(!approvals.settle(Some(Topic::from("P1")), Err(Error::ApprovalTimeout)));
        assert!(approvals.parked.is_empty());

        approvals.begin_connect();
        assert!(approvals.settle(Some(Topic::from("P1")), Err(Error::ApprovalTimeout)));
        let (tx, mut rx) = oneshot::channel();
        approvals.register(Some(Topic::from("P1")), tx);
        approvals.end_connect();

        assert!(matches!(rx.try_recv(), Ok(Err(Error::ApprovalTimeout))));
        assert!(approvals.waiters.is_empty());
        assert!(approvals.parked.is_empty());
    }

    #[tokio::test]
    async fn test_close_rejects_pending_approval() {
        let (client, mut bridge) = connected(json!([])).await;

        let capabilities = CapabilityRequest::default();
        let (proposal, ()) = tokio::join!(
            client.connect(&capabilities),
            async {
                let request = next_request(&mut bridge).await;
                push(&mut bridge, &BridgeResponse::success(request.id, json!({"uri": PAIRING_URI}))).await;
            },
        );
        drop(bridge);

        let err = proposal.expect("proposal").approval.wait().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(!client.is_relay_connected());
    }
}
