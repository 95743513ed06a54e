//! Type-safe identifiers for transport entities.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile time:
//!
//! - [`Token`] - correlation token linking a request to its response
//! - [`ConnectionId`] - identity of one pooled connection

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Token
// ============================================================================

/// Correlation token linking a request to its eventual response.
///
/// Tokens are opaque strings. Callers may supply their own; [`Token::generate`]
/// produces a random UUID-backed token. Uniqueness only matters within one
/// connection session: responses are matched against calls registered on the
/// same socket that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Creates a token from a caller-supplied string.
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a random token.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identity of one pooled connection.
///
/// Assigned from a process-wide counter when the connection is created. The
/// pool uses it to locate a slot when a checkout is returned or a connection
/// is reported failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Returns the next connection ID.
    #[must_use]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generate_unique() {
        let a = Token::generate();
        let b = Token::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_caller_supplied() {
        let token = Token::new("abc-123");
        assert_eq!(token.as_str(), "abc-123");
        assert_eq!(token.to_string(), "abc-123");
    }

    #[test]
    fn test_token_serde_transparent() {
        let token = Token::new("t-1");
        let json = serde_json::to_string(&token).expect("serialize");
        assert_eq!(json, "\"t-1\"");

        let back: Token = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, token);
    }

    #[test]
    fn test_connection_id_monotonic() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::next();
        assert!(id.to_string().starts_with("conn-"));
    }
}
