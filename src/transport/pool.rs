//! Bounded pool of persistent connections.
//!
//! The pool owns every [`Connection`] to the endpoint. Callers check one out
//! with [`ConnectionPool::acquire`] and give it back by dropping the returned
//! [`PooledConnection`] guard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            ConnectionPool                │
//! │       (one endpoint, max N slots)        │
//! │  ┌──────────────────────────────────┐    │
//! │  │ slot 0: Connection, free         │    │
//! │  │ slot 1: Connection, checked out  │    │
//! │  └──────────────────────────────────┘    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Scan-and-claim runs under a single pool lock, so two callers can never
//! claim the same free connection. Connections are created lazily up to
//! `max_pool_size`; a creating caller dials with fixed-interval retry and
//! only returns once the socket is connected. When the pool is exhausted,
//! callers wait on a notify with a bounded timeout and rescan, so a wakeup
//! racing the wait is missed for at most one wait period.
//!
//! A connection that fails is removed during the next scan (its event loop
//! clears the alive flag and notifies); replacement is lazy, on the next
//! acquire that finds the pool below capacity.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::identifiers::ConnectionId;
use crate::transport::connection::{Connection, PushHandler};

// ============================================================================
// Constants
// ============================================================================

/// Bounded wait before an exhausted-pool caller rescans.
const POOL_WAIT: Duration = Duration::from_secs(3);

// ============================================================================
// PoolSlot / PoolState
// ============================================================================

/// One pooled connection and its checkout flag.
struct PoolSlot {
    connection: Connection,
    free: bool,
}

/// Mutable pool state, guarded by one mutex.
struct PoolState {
    slots: Vec<PoolSlot>,
    /// Connections currently being dialed; counts against capacity.
    connecting: usize,
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Bounded set of persistent connections to one endpoint.
pub struct ConnectionPool {
    /// Endpoint address, resolved once and reused by every reconnect.
    addr: SocketAddr,

    /// Maximum number of live connections.
    max_pool_size: usize,

    /// Delay between connect retries.
    retry_interval: Duration,

    /// Slots and in-flight dial count.
    state: Mutex<PoolState>,

    /// Signaled on free, on teardown, and on failed dials.
    available: Arc<Notify>,

    /// Handler installed on every connection, current and future.
    push_handler: Mutex<Option<PushHandler>>,
}

impl ConnectionPool {
    /// Creates an empty pool for the endpoint.
    ///
    /// No connection is dialed until the first [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(addr: SocketAddr, max_pool_size: usize, retry_interval: Duration) -> Arc<Self> {
        info!(%addr, max_pool_size, "Connection pool created");

        Arc::new(Self {
            addr,
            max_pool_size: max_pool_size.max(1),
            retry_interval,
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                connecting: 0,
            }),
            available: Arc::new(Notify::new()),
            push_handler: Mutex::new(None),
        })
    }

    /// Returns the endpoint address.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the number of live connections (checked out or free).
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.lock().slots.len()
    }
}

// ============================================================================
// ConnectionPool - Acquire / Release
// ============================================================================

/// What one scan pass decided.
enum Plan {
    Claimed(Connection),
    Create,
    Wait,
}

impl ConnectionPool {
    /// Checks out a connection, blocking until one is available.
    ///
    /// The wait is unbounded: if the endpoint is unreachable, the dial
    /// retries forever. Callers that need a deadline wrap this future in
    /// `tokio::time::timeout`; cancellation releases any reserved capacity.
    pub async fn acquire(self: &Arc<Self>) -> PooledConnection {
        loop {
            let plan = {
                let mut state = self.state.lock();

                // Dead connections are removed here, lazily.
                state.slots.retain(|slot| {
                    let alive = slot.connection.is_alive();
                    if !alive {
                        debug!(id = %slot.connection.id(), "Removing dead connection");
                    }
                    alive
                });

                if let Some(slot) = state.slots.iter_mut().find(|slot| slot.free) {
                    slot.free = false;
                    Plan::Claimed(slot.connection.clone())
                } else if state.slots.len() + state.connecting < self.max_pool_size {
                    state.connecting += 1;
                    Plan::Create
                } else {
                    Plan::Wait
                }
            };

            match plan {
                Plan::Claimed(connection) => {
                    debug!(id = %connection.id(), "Connection checked out");
                    return PooledConnection {
                        pool: Arc::clone(self),
                        connection,
                    };
                }

                Plan::Create => {
                    let mut permit = ConnectPermit {
                        pool: self.as_ref(),
                        armed: true,
                    };

                    let connection = Connection::open(
                        self.addr,
                        self.retry_interval,
                        Arc::clone(&self.available),
                    )
                    .await;

                    if let Some(handler) = self.push_handler.lock().clone() {
                        connection.set_push_handler(handler);
                    }

                    {
                        let mut state = self.state.lock();
                        state.connecting -= 1;
                        state.slots.push(PoolSlot {
                            connection: connection.clone(),
                            free: false,
                        });
                    }
                    permit.armed = false;

                    debug!(id = %connection.id(), "Connection created and checked out");
                    return PooledConnection {
                        pool: Arc::clone(self),
                        connection,
                    };
                }

                Plan::Wait => {
                    // Bounded wait, then rescan. A free() racing the wait
                    // costs at most one wait period.
                    let _ = timeout(POOL_WAIT, self.available.notified()).await;
                }
            }
        }
    }

    /// Returns a checkout to the pool.
    fn release(&self, id: ConnectionId, alive: bool) {
        {
            let mut state = self.state.lock();
            if alive {
                if let Some(slot) = state
                    .slots
                    .iter_mut()
                    .find(|slot| slot.connection.id() == id)
                {
                    slot.free = true;
                }
            } else {
                state.slots.retain(|slot| slot.connection.id() != id);
            }
        }

        debug!(%id, alive, "Connection released");
        self.available.notify_waiters();
    }

    /// Removes a connection from the pool and closes it.
    ///
    /// Replacement is lazy: the next acquire that finds the pool below
    /// capacity dials a fresh connection.
    pub fn report_failed(&self, connection: &Connection) {
        {
            let mut state = self.state.lock();
            state
                .slots
                .retain(|slot| slot.connection.id() != connection.id());
        }

        warn!(id = %connection.id(), "Connection reported failed, removed from pool");
        connection.shutdown();
        self.available.notify_waiters();
    }
}

// ============================================================================
// ConnectionPool - Push Handlers
// ============================================================================

impl ConnectionPool {
    /// Installs the push handler on every current and future connection.
    pub fn set_push_handler(&self, handler: PushHandler) {
        *self.push_handler.lock() = Some(handler.clone());

        let state = self.state.lock();
        for slot in &state.slots {
            slot.connection.set_push_handler(handler.clone());
        }
    }

    /// Clears the push handler everywhere.
    pub fn clear_push_handler(&self) {
        *self.push_handler.lock() = None;

        let state = self.state.lock();
        for slot in &state.slots {
            slot.connection.clear_push_handler();
        }
    }
}

// ============================================================================
// ConnectionPool - Lifecycle
// ============================================================================

impl ConnectionPool {
    /// Shuts down every connection and empties the pool.
    pub fn shutdown(&self) {
        let slots = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.slots)
        };

        for slot in &slots {
            slot.connection.shutdown();
            debug!(id = %slot.connection.id(), "Connection closed during shutdown");
        }

        self.available.notify_waiters();
        info!("Connection pool shut down");
    }
}

// ============================================================================
// ConnectPermit
// ============================================================================

/// Reserved-capacity guard for an in-flight dial.
///
/// If the acquiring future is dropped mid-dial, the reservation is returned
/// so the slot is not leaked.
struct ConnectPermit<'a> {
    pool: &'a ConnectionPool,
    armed: bool,
}

impl Drop for ConnectPermit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.state.lock().connecting -= 1;
            self.pool.available.notify_waiters();
        }
    }
}

// ============================================================================
// PooledConnection
// ============================================================================

/// Checkout guard for one pooled connection.
///
/// Dereferences to [`Connection`]. Dropping the guard returns the connection
/// to the pool, or removes it if its event loop has died.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    connection: Connection,
}

impl Deref for PooledConnection {
    type Target = Connection;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool
            .release(self.connection.id(), self.connection.is_alive());
    }
}

// ============================================================================
// Tests
// ============================================================================
