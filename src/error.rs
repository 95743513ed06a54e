//! Error types for the feed service client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use feedlink::{FeedClient, Result};
//!
//! async fn example(client: &FeedClient) -> Result<()> {
//!     let feed = client.feeds().find("office/temperature").await?;
//!     println!("{:?}", feed);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::Io`] |
//! | Protocol | [`Error::Protocol`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | Service | [`Error::Status`], [`Error::NotFound`] |
//! | Serialization | [`Error::Json`] |
//!
//! A per-call timeout ([`Error::RequestTimeout`]) is deliberately a different
//! variant from a lost transport ([`Error::ConnectionClosed`]): callers retry
//! them differently.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::Token;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Timed out waiting for a pooled connection to become available.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Socket operation failed mid-session.
    ///
    /// I/O errors in this crate only come from the transport socket, so this
    /// counts as a connection error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message.
    ///
    /// Returned when a frame is neither a request nor a response.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// No response arrived for a request within the configured wait.
    #[error("Request {token} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The correlation token that went unanswered.
        token: Token,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Service Errors
    // ========================================================================
    /// The service answered with a non-success status.
    #[error("Service returned status {status} for {resource}")]
    Status {
        /// Status code from the response.
        status: u16,
        /// Resource the request addressed.
        resource: String,
    },

    /// The requested resource does not exist (status 404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource the request addressed.
        resource: String,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(token: Token, timeout_ms: u64) -> Self {
        Self::RequestTimeout { token, timeout_ms }
    }

    /// Creates a service status error.
    #[inline]
    pub fn status(status: u16, resource: impl Into<String>) -> Self {
        Self::Status {
            status,
            resource: resource.into(),
        }
    }

    /// Creates a not-found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ConnectionClosed | Self::Io(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. } | Self::ConnectionClosed
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
