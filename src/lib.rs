//! feedlink - client for hierarchical sensor feed services.
//!
//! This library models hierarchical feed resources (sensor streams, possibly
//! nested, each carrying time-keyed data entries) and lets a caller create,
//! read, and update them over pooled, persistent TCP connections.
//!
//! # Architecture
//!
//! The wire protocol is hand-rolled request/response multiplexing:
//!
//! - Messages are bare JSON objects; frame boundary is the balanced top-level
//!   braces themselves (no length prefix)
//! - A response is matched to its request by an opaque correlation token, not
//!   by send order
//! - The service can push its own requests down an open connection; a
//!   registered handler may answer them
//! - Connections are pooled; failed sockets are redialed with fixed-interval
//!   retry on the next checkout
//!
//! # Quick Start
//!
//! ```no_run
//! use feedlink::{Entry, Feed, FeedClient, KeyType, Result, ValueType};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = FeedClient::builder()
//!         .host("api.example.com:9011")
//!         .basic_auth("longshine", "secret")
//!         .build()
//!         .await?;
//!
//!     // Answer server-initiated commands.
//!     client.on_push(|request| {
//!         println!("push: {} {}", request.method, request.resource);
//!         None
//!     });
//!
//!     // Create a feed and read it back.
//!     let feed = Feed::new("temperature")
//!         .with_key_type(KeyType::Date)
//!         .with_value_type(ValueType::Number)
//!         .with_entry(Entry::new("2013-04-01T00:00:00Z", json!(21.5)));
//!
//!     client.feeds().create(&feed).await?;
//!     let found = client.feeds().find("temperature").await?;
//!     println!("{:?}", found);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Caller API: [`FeedClient`], [`FeedsApi`], configuration |
//! | [`entity`] | Payload types: [`Feed`], [`Entry`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and framing (internal) |
//! | [`transport`] | Pooled TCP transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Caller API: client, configuration, feed operations.
///
/// Use [`FeedClient::builder()`] to create a configured client.
pub mod client;

/// Feed entities: the payload types flowing through the transport.
pub mod entity;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for transport entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types and frame extraction.
///
/// Internal module defining request/response structures and the framer.
pub mod protocol;

/// Pooled TCP transport layer.
///
/// Internal module handling connections, correlation, and push dispatch.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientBuilder, Credential, FeedClient, FeedsApi};

// Entity types
pub use entity::{Entry, Feed, FeedAccess, FeedStatus, KeyType, ValueType};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, Token};

// Protocol types
pub use protocol::{Request, Response};
