//! Wire protocol: message types and frame extraction.
//!
//! Messages are JSON objects sent back-to-back on a persistent TCP stream.
//! The frame boundary is the balanced top-level braces themselves; there is
//! no length prefix. Encoding is UTF-8.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Discriminator |
//! |--------------|-----------|---------------|
//! | `Request` | Client → Service | `method` field |
//! | `Response` | Service → Client | `status` field |
//! | Push `Request` | Service → Client | `method` field, unsolicited |
//!
//! Responses are correlated to requests by an opaque `token`; send order and
//! response order are unrelated.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `framer` | Brace-counted JSON frame extraction |
//! | `message` | Request, Response, and frame classification |

// ============================================================================
// Submodules
// ============================================================================

/// Brace-counted JSON frame extraction.
pub mod framer;

/// Request and Response message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use framer::Framer;
pub use message::{Message, Request, Response, encode};
