//! Persistent TCP transport layer.
//!
//! This module carries requests and responses between the client and the
//! feed service over pooled, persistent sockets.
//!
//! ```text
//! caller ──► ConnectionPool::acquire ──► Connection::send ──► socket write
//!                                                              socket read
//!                                            Framer ◄──────────────┘
//!                                              │
//!                            status field ─────┤───── method field
//!                                 ▼                        ▼
//!                         pending-call table         push worker
//!                        (wake the caller)       (handler, maybe reply)
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionPool::acquire` - claim a free connection, or dial a new one
//!    (with fixed-interval retry) while the pool is below capacity
//! 2. `Connection::send` - register the token, write the frame, await the
//!    correlated response
//! 3. Drop the checkout guard - the connection returns to the pool
//! 4. On I/O failure the connection is removed; the next acquire replaces it
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | One socket: event loop, pending calls, push dispatch |
//! | `pool` | Bounded checkout pool with lazy creation |

// ============================================================================
// Submodules
// ============================================================================

/// Persistent TCP connection and event loop.
pub mod connection;

/// Bounded pool of persistent connections.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, PushHandler};
pub use pool::{ConnectionPool, PooledConnection};
