//! WebSocket connection and event loop.
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the remote end (results, errors, events)
//! - Outgoing commands from the driver
//! - Request/response correlation by integer id

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::protocol::{Message, Request, remote_error};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

/// Delay between connection attempts while the remote agent starts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(250);

// ============================================================================
// Types
// ============================================================================

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a BiDi remote end.
///
/// Cloning shares the same event loop.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
}

impl Connection {
    /// Connects to `url`, retrying until `connect_timeout` elapses.
    ///
    /// A freshly spawned browser refuses connections until its remote
    /// agent is listening, so refusals are retried.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionTimeout`] if no connection succeeds in time.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + connect_timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match connect_async(url).await {
                Ok((ws_stream, _)) => {
                    debug!(url, attempts, "BiDi WebSocket connected");
                    return Ok(Self::new(ws_stream));
                }
                Err(e) if Instant::now() + CONNECT_RETRY_DELAY < deadline => {
                    trace!(url, attempts, error = %e, "Remote agent not ready");
                    sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(url, attempts, error = %e, "Giving up on remote agent");
                    return Err(Error::connection_timeout(
                        connect_timeout.as_millis() as u64,
                    ));
                }
            }
        }
    }

    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    fn new(ws_stream: Stream) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
        ));

        Self {
            command_tx,
            correlation,
        }
    }

    /// Sends a command and waits for its result with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - the mapped remote error if the command failed
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.send_with_timeout(Request::new(method, params), DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Sends a request and waits for its result with a custom timeout.
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Value> {
        let request_id = request.id;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
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
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Closes the WebSocket and stops the event loop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: Stream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation);
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by remote");
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
                            let request_id = request.id;
                            let json = match to_string(&request) {
                                Ok(j) => j,
                                Err(e) => {
                                    let _ = response_tx.send(Err(Error::Json(e)));
                                    continue;
                                }
                            };

                            correlation.lock().insert(request_id, response_tx);

                            if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await
                                && let Some(tx) = correlation.lock().remove(&request_id)
                            {
                                let _ = tx.send(Err(Error::connection(e.to_string())));
                            }

                            trace!(%request_id, method = %request.method, "Request sent");
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

        Self::fail_pending_requests(&correlation);
        debug!("Event loop terminated");
    }

    /// Routes one incoming text frame.
    fn handle_incoming_message(text: &str, correlation: &Arc<Mutex<CorrelationMap>>) {
        let message = match from_str::<Message>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse incoming message");
                return;
            }
        };

        let (id, outcome) = match message {
            Message::Success { id, result } => (id, Ok(result)),
            Message::Error {
                id: Some(id),
                error,
                message,
            } => (id, Err(remote_error(&error, &message))),
            Message::Error {
                id: None,
                error,
                message,
            } => {
                warn!(%error, %message, "Uncorrelated error from remote end");
                return;
            }
            Message::Event { method, .. } => {
                trace!(%method, "Ignoring event");
                return;
            }
        };

        match correlation.lock().remove(&id) {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => warn!(%id, "Response for unknown request"),
        }
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 60);
        assert_eq!(MAX_PENDING_REQUESTS, 100);
    }

    #[test]
    fn test_incoming_success_resolves_waiter() {
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let (tx, mut rx) = oneshot::channel();
        correlation.lock().insert(RequestId::new(9), tx);

        Connection::handle_incoming_message(
            r#"{"type":"success","id":9,"result":{"ok":true}}"#,
            &correlation,
        );

        let value = rx.try_recv().expect("resolved").expect("success");
        assert_eq!(value["ok"], true);
        assert!(correlation.lock().is_empty());
    }

    #[test]
    fn test_incoming_error_maps_code() {
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let (tx, mut rx) = oneshot::channel();
        correlation.lock().insert(RequestId::new(4), tx);

        Connection::handle_incoming_message(
            r#"{"type":"error","id":4,"error":"no such node","message":"gone"}"#,
            &correlation,
        );

        let outcome = rx.try_recv().expect("resolved");
        assert!(matches!(outcome, Err(Error::ElementNotFound { .. })));
    }

    #[test]
    fn test_fail_pending_requests() {
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let (tx, mut rx) = oneshot::channel();
        correlation.lock().insert(RequestId::new(1), tx);

        Connection::fail_pending_requests(&correlation);

        assert!(matches!(
            rx.try_recv().expect("resolved"),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_timeout() {
        // Port 9 (discard) is never a BiDi endpoint on test hosts.
        let result = Connection::connect("ws://127.0.0.1:9/session", Duration::from_millis(300)).await;
        assert!(matches!(result, Err(Error::ConnectionTimeout { .. })));
    }
}
