//! Persistent TCP connection and event loop.
//!
//! One [`Connection`] owns one socket for its lifetime. An internal event
//! loop task owns both halves of the stream: the read side feeds the
//! [`Framer`] and classifies each decoded frame; the write side serializes
//! outbound requests so concurrent sends never interleave mid-frame.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the service (responses, push requests)
//! - Outgoing requests from the caller API
//! - Request/response correlation by token (the pending-call table)
//! - Push request hand-off to the dispatch worker
//!
//! Push handlers run on a separate worker task: the read path only decodes
//! and enqueues, so a slow or panicking handler cannot stall the socket.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, Token};
use crate::protocol::{Framer, Message, Request, Response, encode};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for one call (3s).
pub(crate) const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Maximum pending calls per connection before rejecting new ones.
const MAX_PENDING_CALLS: usize = 64;

/// Read buffer chunk size.
const READ_CHUNK: usize = 8192;

// ============================================================================
// Types
// ============================================================================

/// Pending-call table: correlation token to the waiting caller.
type CallTable = FxHashMap<Token, oneshot::Sender<Result<Response>>>;

/// Push handler callback type.
///
/// Called once for each push request received from the service. Return
/// `Some(Response)` to answer it on the same socket; the response inherits
/// the push request's token when none is set.
pub type PushHandler = Arc<dyn Fn(Request) -> Option<Response> + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for a response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a push reply produced by the dispatch worker.
    SendReply(Response),
    /// Remove a timed-out pending call.
    RemoveCall(Token),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// One pooled, persistent TCP connection to the feed service.
///
/// Handles request/response correlation and push dispatch. Cheap to clone;
/// clones share the same socket and pending-call table.
#[derive(Clone)]
pub struct Connection {
    /// Connection identity within the pool.
    id: ConnectionId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Pending-call table (shared with the event loop).
    calls: Arc<Mutex<CallTable>>,
    /// Push handler (shared with the dispatch worker).
    push_handler: Arc<Mutex<Option<PushHandler>>>,
    /// Cleared when the event loop exits.
    alive: Arc<AtomicBool>,
}

impl Connection {
    /// Creates a connection from an established stream.
    ///
    /// Spawns the event loop and the push dispatch worker. `wakeup` is
    /// notified when the event loop exits, so pool waiters can rescan.
    pub(crate) fn new(stream: TcpStream, wakeup: Arc<Notify>) -> Self {
        let id = ConnectionId::next();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let calls: Arc<Mutex<CallTable>> = Arc::new(Mutex::new(FxHashMap::default()));
        let push_handler: Arc<Mutex<Option<PushHandler>>> = Arc::new(Mutex::new(None));
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_push_worker(
            id,
            push_rx,
            Arc::clone(&push_handler),
            command_tx.clone(),
        ));

        tokio::spawn(Self::run_event_loop(
            id,
            stream,
            command_rx,
            Arc::clone(&calls),
            push_tx,
            Arc::clone(&alive),
            wakeup,
        ));

        Self {
            id,
            command_tx,
            calls,
            push_handler,
            alive,
        }
    }

    /// Dials the endpoint, retrying with a fixed delay until it succeeds.
    ///
    /// Never gives up on its own; dropping the future cancels the retry
    /// loop, in which case the connection is never created.
    pub(crate) async fn open(
        addr: SocketAddr,
        retry_interval: Duration,
        wakeup: Arc<Notify>,
    ) -> Self {
        let stream = Self::connect_with_retry(addr, retry_interval).await;
        Self::new(stream, wakeup)
    }

    async fn connect_with_retry(addr: SocketAddr, retry_interval: Duration) -> TcpStream {
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    debug!(%addr, "Connected");
                    return stream;
                }
                Err(e) => {
                    warn!(
                        %addr,
                        error = %e,
                        retry_ms = retry_interval.as_millis() as u64,
                        "Connect failed, retrying"
                    );
                    sleep(retry_interval).await;
                }
            }
        }
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Returns the connection identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Sets the push handler callback.
    pub fn set_push_handler(&self, handler: PushHandler) {
        let mut guard = self.push_handler.lock();
        *guard = Some(handler);
    }

    /// Clears the push handler.
    pub fn clear_push_handler(&self) {
        let mut guard = self.push_handler.lock();
        *guard = None;
    }

    /// Sends a request and waits for the correlated response (default 3s).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is down
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many calls are pending
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, DEFAULT_CALL_TIMEOUT).await
    }

    /// Sends a request and waits for the correlated response.
    ///
    /// On timeout the pending call is removed from the table; a response
    /// arriving later is dropped as unmatched.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is down
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many calls are pending
    pub async fn send_with_timeout(
        &self,
        request: Request,
        call_timeout: Duration,
    ) -> Result<Response> {
        let token = request.token.clone();

        {
            let calls = self.calls.lock();
            if calls.len() >= MAX_PENDING_CALLS {
                warn!(
                    pending = calls.len(),
                    max = MAX_PENDING_CALLS,
                    "Too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending calls: {}/{}",
                    calls.len(),
                    MAX_PENDING_CALLS
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

        match timeout(call_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Timeout: expire the table entry so a late response is
                // dropped instead of accumulating.
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCall(token.clone()));

                Err(Error::request_timeout(
                    token,
                    call_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Shuts down the connection.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Event loop that owns the socket.
    async fn run_event_loop(
        id: ConnectionId,
        stream: TcpStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        calls: Arc<Mutex<CallTable>>,
        push_tx: mpsc::UnboundedSender<Request>,
        alive: Arc<AtomicBool>,
        wakeup: Arc<Notify>,
    ) {
        let (mut read_half, mut write_half) = stream.into_split();
        let mut framer = Framer::new();
        let mut read_buf = BytesMut::with_capacity(READ_CHUNK);

        loop {
            tokio::select! {
                // Incoming bytes from the service
                result = read_half.read_buf(&mut read_buf) => {
                    match result {
                        Ok(0) => {
                            debug!(%id, "Stream closed by remote");
                            break;
                        }
                        Ok(_) => {
                            let chunk = read_buf.split();
                            for frame in framer.push(&chunk) {
                                Self::handle_frame(id, &frame, &calls, &push_tx);
                            }
                        }
                        Err(e) => {
                            error!(%id, error = %e, "Read failed");
                            break;
                        }
                    }
                }

                // Commands from the caller API and the push worker
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            let ok = Self::handle_send(
                                id,
                                request,
                                response_tx,
                                &mut write_half,
                                &calls,
                            ).await;
                            if !ok {
                                break;
                            }
                        }

                        Some(ConnectionCommand::SendReply(response)) => {
                            match encode(&response) {
                                Ok(bytes) => {
                                    if let Err(e) = write_half.write_all(&bytes).await {
                                        error!(%id, error = %e, "Push reply write failed");
                                        break;
                                    }
                                }
                                Err(e) => warn!(%id, error = %e, "Push reply encode failed"),
                            }
                        }

                        Some(ConnectionCommand::RemoveCall(token)) => {
                            calls.lock().remove(&token);
                            debug!(%id, %token, "Removed timed-out call");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(%id, "Shutdown command received");
                            let _ = write_half.shutdown().await;
                            break;
                        }

                        None => {
                            debug!(%id, "Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        alive.store(false, Ordering::SeqCst);
        Self::fail_pending_calls(id, &calls);
        wakeup.notify_waiters();

        debug!(%id, "Connection loop terminated");
    }

    /// Classifies one decoded frame and dispatches it.
    ///
    /// Malformed frames are logged and dropped; they do not fail the
    /// connection.
    fn handle_frame(
        id: ConnectionId,
        frame: &[u8],
        calls: &Arc<Mutex<CallTable>>,
        push_tx: &mpsc::UnboundedSender<Request>,
    ) {
        match Message::decode(frame) {
            Ok(Message::Response(response)) => {
                let tx = response
                    .token
                    .as_ref()
                    .and_then(|token| calls.lock().remove(token));

                match tx {
                    Some(tx) => {
                        let _ = tx.send(Ok(response));
                    }
                    None => {
                        warn!(
                            %id,
                            token = ?response.token,
                            "Response for unknown token, dropped"
                        );
                    }
                }
            }

            Ok(Message::Request(request)) => {
                trace!(%id, method = %request.method, "Push request received");
                let _ = push_tx.send(request);
            }

            Err(e) => {
                warn!(%id, error = %e, "Undecodable frame, dropped");
            }
        }
    }

    /// Writes one request. Returns `false` if the connection must go down.
    async fn handle_send(
        id: ConnectionId,
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        write_half: &mut OwnedWriteHalf,
        calls: &Arc<Mutex<CallTable>>,
    ) -> bool {
        let token = request.token.clone();

        let bytes = match encode(&request) {
            Ok(b) => b,
            Err(e) => {
                let _ = response_tx.send(Err(e));
                return true;
            }
        };

        // Register before writing so a fast response cannot race the table.
        calls.lock().insert(token.clone(), response_tx);

        if let Err(e) = write_half.write_all(&bytes).await {
            error!(%id, error = %e, "Write failed");
            if let Some(tx) = calls.lock().remove(&token) {
                let _ = tx.send(Err(Error::Io(e)));
            }
            return false;
        }

        trace!(%id, %token, "Request sent");
        true
    }

    /// Fails every pending call with `ConnectionClosed`.
    fn fail_pending_calls(id: ConnectionId, calls: &Arc<Mutex<CallTable>>) {
        let pending: Vec<_> = calls.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(%id, count, "Failed pending calls on teardown");
        }
    }
}

// ============================================================================
// Connection - Push Dispatch Worker
// ============================================================================

impl Connection {
    /// Drains decoded push requests and invokes the registered handler.
    ///
    /// Runs until the event loop drops the push channel. Handler panics are
    /// caught so one bad callback cannot take the worker down.
    async fn run_push_worker(
        id: ConnectionId,
        mut push_rx: mpsc::UnboundedReceiver<Request>,
        push_handler: Arc<Mutex<Option<PushHandler>>>,
        command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    ) {
        while let Some(request) = push_rx.recv().await {
            let handler = push_handler.lock().clone();

            let Some(handler) = handler else {
                debug!(%id, method = %request.method, "Push received with no handler");
                continue;
            };

            let token = request.token.clone();

            match catch_unwind(AssertUnwindSafe(|| handler(request))) {
                Ok(Some(mut response)) => {
                    if response.token.is_none() {
                        response.token = Some(token);
                    }
                    let _ = command_tx.send(ConnectionCommand::SendReply(response));
                }
                Ok(None) => {}
                Err(_) => {
                    error!(%id, "Push handler panicked");
                }
            }
        }

        trace!(%id, "Push worker terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
