//! Client configuration and builder.
//!
//! Provides a type-safe interface for configuring the feed client: endpoint,
//! pool size, retry interval, per-call timeout, and credentials.
//!
//! # Example
//!
//! ```ignore
//! use feedlink::FeedClient;
//!
//! let client = FeedClient::builder()
//!     .host("api.example.com")
//!     .port(9011)
//!     .basic_auth("longshine", "secret")
//!     .max_pool_size(4)
//!     .build()
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::net::lookup_host;
use tracing::debug;

use crate::client::FeedClient;
use crate::error::{Error, Result};
use crate::transport::ConnectionPool;

// ============================================================================
// Constants
// ============================================================================

/// Default service port.
const DEFAULT_PORT: u16 = 9011;

/// Default maximum pool size.
const DEFAULT_MAX_POOL_SIZE: usize = 1;

/// Default delay between connect retries (10s).
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default per-call timeout (3s).
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(3000);

// ============================================================================
// Credential
// ============================================================================

/// Credential attached to every outgoing request.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Username and password, sent as a Basic authorization header.
    Basic {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// API key, sent as an `X-ApiKey` header.
    ApiKey(String),
}

impl Credential {
    /// Returns the header name and value for this credential.
    #[must_use]
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                ("authorization", format!("BASIC {encoded}"))
            }
            Self::ApiKey(key) => ("X-ApiKey", key.clone()),
        }
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for [`FeedClient`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: Option<String>,
    port: u16,
    max_pool_size: usize,
    retry_interval: Duration,
    call_timeout: Duration,
    credential: Option<Credential>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            credential: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service host. Accepts `host` or `host:port`.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                self.host = Some(name.to_string());
                if let Ok(port) = port.parse() {
                    self.port = port;
                }
            }
            _ => self.host = Some(host),
        }
        self
    }

    /// Sets the service port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the maximum number of pooled connections.
    #[inline]
    #[must_use]
    pub fn max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// Sets the delay between connect retries.
    #[inline]
    #[must_use]
    pub fn retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Sets the per-call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Authenticates with username and password.
    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Authenticates with an API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.credential = Some(Credential::ApiKey(key.into()));
        self
    }
}

// ============================================================================
// Build
// ============================================================================

impl ClientBuilder {
    /// Resolves the endpoint and creates the client.
    ///
    /// The address is resolved once here; every reconnect reuses it. No
    /// connection is dialed until the first call.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if host or port is missing or unresolvable
    pub async fn build(self) -> Result<FeedClient> {
        let host = self.host.ok_or_else(|| Error::config("host is required"))?;
        if self.port == 0 {
            return Err(Error::config("port must be non-zero"));
        }

        let addr = lookup_host((host.as_str(), self.port))
            .await
            .map_err(|e| Error::config(format!("cannot resolve {host}:{}: {e}", self.port)))?
            .next()
            .ok_or_else(|| Error::config(format!("no address for {host}:{}", self.port)))?;

        debug!(%addr, host = %host, "Endpoint resolved");

        let pool = ConnectionPool::new(addr, self.max_pool_size, self.retry_interval);

        Ok(FeedClient::new(pool, self.call_timeout, self.credential))
    }
}

// ============================================================================
// Tests
// ============================================================================
