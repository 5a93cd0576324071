//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to the bridge, including
//! request/response correlation and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the bridge (responses, events)
//! - Outgoing requests from the Rust API
//! - Request/response correlation by UUID
//! - The inbound callback, including one final [`Inbound::Closed`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::frame::{BridgeEvent, BridgeRequest, BridgeResponse};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for bridge calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum pending requests before rejecting new ones.
pub const DEFAULT_MAX_PENDING: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<BridgeResponse>>>;

/// Something the bridge pushed, or the end of the stream.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A notification frame.
    Event(BridgeEvent),
    /// The connection closed. Delivered once.
    Closed,
}

/// Inbound callback type.
///
/// Runs on the event loop task; must return quickly.
pub type InboundHandler = Arc<dyn Fn(Inbound) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: BridgeRequest,
        response_tx: oneshot::Sender<Result<BridgeResponse>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the bridge.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Inbound handler (shared with event loop).
    handler: Arc<Mutex<Option<InboundHandler>>>,
    /// Set once the event loop has stopped.
    closed: Arc<AtomicBool>,
    /// Pending-call ceiling.
    max_pending: usize,
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub fn new<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let handler: Arc<Mutex<Option<InboundHandler>>> = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&handler),
            Arc::clone(&closed),
        ));

        Self {
            command_tx,
            correlation,
            handler,
            closed,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// Sets the pending-call ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Sets the inbound callback, replacing any previous one.
    pub fn set_handler(&self, handler: InboundHandler) {
        *self.handler.lock() = Some(handler);
    }

    /// Sends a request and waits for the response with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_with_timeout`].
    pub async fn send(&self, request: BridgeRequest) -> Result<BridgeResponse> {
        self.send_with_timeout(request, DEFAULT_CALL_TIMEOUT).await
    }

    /// Sends a request and waits for the response with a custom timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::RequestTimeout`] if no response arrives within the timeout
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send_with_timeout(
        &self,
        request: BridgeRequest,
        request_timeout: Duration,
    ) -> Result<BridgeResponse> {
        let request_id = request.id;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= self.max_pending {
                warn!(
                    pending = correlation.len(),
                    max = self.max_pending,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    self.max_pending
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }

    /// Sends a request and extracts its result.
    ///
    /// # Errors
    ///
    /// Transport errors as for [`Connection::send_with_timeout`], plus
    /// [`Error::Remote`] for error responses.
    pub async fn call(
        &self,
        request: BridgeRequest,
        request_timeout: Duration,
    ) -> Result<serde_json::Value> {
        let method = request.method.clone();
        let response = self.send_with_timeout(request, request_timeout).await?;
        trace!(%method, success = response.is_success(), "Bridge call returned");
        response.into_result()
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shuts down the connection gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        handler: Arc<Mutex<Option<InboundHandler>>>,
        closed: Arc<AtomicBool>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &handler);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by bridge");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        Self::fail_pending_requests(&correlation);
        Self::dispatch(&handler, Inbound::Closed);

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the bridge.
    fn handle_incoming_message(
        text: &str,
        correlation: &Mutex<CorrelationMap>,
        handler: &Mutex<Option<InboundHandler>>,
    ) {
        if let Ok(response) = from_str::<BridgeResponse>(text) {
            let tx = correlation.lock().remove(&response.id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(response));
                }
                None => warn!(id = %response.id, "Response for unknown request"),
            }
            return;
        }

        if let Ok(event) = from_str::<BridgeEvent>(text) {
            trace!(method = %event.method, "Event received");
            Self::dispatch(handler, Inbound::Event(event));
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Invokes the handler outside its lock.
    fn dispatch(handler: &Mutex<Option<InboundHandler>>, inbound: Inbound) {
        let handler = handler.lock().clone();
        if let Some(handler) = handler {
            handler(inbound);
        }
    }

    /// Handles a send command from the Rust API.
    async fn handle_send_command<S>(
        request: BridgeRequest,
        response_tx: oneshot::Sender<Result<BridgeResponse>>,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        correlation: &Mutex<CorrelationMap>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(%request_id, method = %request.method, "Request sent");
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
