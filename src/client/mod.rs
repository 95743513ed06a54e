//! Feed service client.
//!
//! [`FeedClient`] is the caller-facing surface: it owns the connection pool
//! and the configuration, attaches credentials to every request, and exposes
//! feed operations through scoped [`FeedsApi`] handles.
//!
//! # Request Path
//!
//! 1. Attach the credential header
//! 2. Check a connection out of the pool (bounded by the per-call timeout)
//! 3. Send and await the correlated response
//! 4. Return the checkout to the pool
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Configuration and credentials |
//! | `feeds` | Feed operations: find, create, update, delete |

// ============================================================================
// Submodules
// ============================================================================

/// Client configuration and builder.
pub mod builder;

/// Feed operations.
pub mod feeds;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{Request, Response};
use crate::transport::{ConnectionPool, PushHandler};

pub use builder::{ClientBuilder, Credential};
pub use feeds::FeedsApi;

// ============================================================================
// FeedClient
// ============================================================================

/// Client for a remote feed service over pooled, persistent TCP.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct FeedClient {
    pool: Arc<ConnectionPool>,
    call_timeout: Duration,
    credential: Option<Credential>,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Returns a builder with default settings.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        pool: Arc<ConnectionPool>,
        call_timeout: Duration,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            pool,
            call_timeout,
            credential,
        }
    }

    /// Returns the per-call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

// ============================================================================
// FeedClient - Feed Scopes
// ============================================================================

impl FeedClient {
    /// Feeds of the authenticated account (`/feeds`).
    #[inline]
    #[must_use]
    pub fn feeds(&self) -> FeedsApi<'_> {
        FeedsApi::new(self, "")
    }

    /// Feeds owned by another user (`/{username}`).
    #[inline]
    #[must_use]
    pub fn user_feeds(&self, username: &str) -> FeedsApi<'_> {
        FeedsApi::new(self, username)
    }

    /// Children of a feed (`/feeds/{parent}`).
    #[inline]
    #[must_use]
    pub fn child_feeds(&self, parent_path: &str) -> FeedsApi<'_> {
        FeedsApi::new(self, &format!("/feeds/{}", parent_path.trim_start_matches('/')))
    }
}

// ============================================================================
// FeedClient - Push Commands
// ============================================================================

impl FeedClient {
    /// Registers the handler for server-initiated push requests.
    ///
    /// The handler runs once per push, off the socket read path. Returning
    /// `Some(Response)` answers the push on the same connection, correlated
    /// with the push request's token.
    pub fn on_push(&self, handler: impl Fn(Request) -> Option<Response> + Send + Sync + 'static) {
        let handler: PushHandler = Arc::new(handler);
        self.pool.set_push_handler(handler);
    }

    /// Removes the push handler. Further pushes are dropped.
    pub fn clear_push_handler(&self) {
        self.pool.clear_push_handler();
    }
}

// ============================================================================
// FeedClient - Execution
// ============================================================================

impl FeedClient {
    /// Sends one request and awaits its response.
    ///
    /// The per-call timeout bounds both the pool checkout and the response
    /// wait, so a caller never blocks past its deadline even while the pool
    /// is dialing.
    pub(crate) async fn execute(&self, mut request: Request) -> Result<Response> {
        if let Some(credential) = &self.credential {
            let (name, value) = credential.header();
            if request.get_header(name).is_none() {
                request = request.header(name, value);
            }
        }

        let timeout_ms = self.call_timeout.as_millis() as u64;

        let checkout = timeout(self.call_timeout, self.pool.acquire())
            .await
            .map_err(|_| Error::connection_timeout(timeout_ms))?;

        checkout.send_with_timeout(request, self.call_timeout).await
    }

    /// Shuts down the pool and every connection.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
