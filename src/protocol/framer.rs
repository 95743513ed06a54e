//! Brace-counted JSON frame extraction.
//!
//! The wire carries back-to-back JSON objects with no length prefix and no
//! delimiter beyond the braces themselves. A frame is one complete top-level
//! `{...}` object: depth goes 0 → 1 → ... → 0 and the accumulated bytes are
//! emitted.
//!
//! The framer is an incremental state machine, safe to feed with arbitrary
//! read chunks; a partial frame persists across calls to [`Framer::push`].
//! Unlike a bare brace counter, it tracks quoted-string state (honoring `\`
//! escapes) so brace characters inside string values do not split frames.
//! The on-wire format is unchanged. Bytes arriving between frames that are
//! not `{` are discarded.

// ============================================================================
// Imports
// ============================================================================

use bytes::{BufMut, Bytes, BytesMut};

// ============================================================================
// Constants
// ============================================================================

/// Initial capacity of the frame accumulator.
const ACCUMULATOR_CAPACITY: usize = 4096;

// ============================================================================
// Framer
// ============================================================================

/// Incremental extractor of complete JSON-object frames from a byte stream.
#[derive(Debug)]
pub struct Framer {
    /// Accumulator for the in-progress frame.
    buf: BytesMut,
    /// Brace depth of the current position.
    depth: u32,
    /// Whether the current position is inside a quoted string.
    in_string: bool,
    /// Whether the previous byte was a backslash inside a string.
    escaped: bool,
}

impl Framer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(ACCUMULATOR_CAPACITY),
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Feeds received bytes and returns every frame completed by them.
    ///
    /// Frames are returned in arrival order. Leftover bytes stay buffered
    /// until a later call completes them.
    pub fn push(&mut self, input: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();

        for &byte in input {
            // Between frames only an opening brace is meaningful.
            if self.depth == 0 && byte != b'{' {
                continue;
            }

            self.buf.put_u8(byte);

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        frames.push(self.buf.split().freeze());
                    }
                }
                _ => {}
            }
        }

        frames
    }

    /// Returns the number of bytes buffered for an incomplete frame.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frames_as_strings(frames: Vec<Bytes>) -> Vec<String> {
        frames
            .into_iter()
            .map(|f| String::from_utf8(f.to_vec()).expect("utf-8"))
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let mut framer = Framer::new();
        let frames = framer.push(br#"{"status":200}"#);
        assert_eq!(frames_as_strings(frames), vec![r#"{"status":200}"#]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut framer = Framer::new();
        let frames = framer.push(br#"{"a":1}{"b":2}{"c":3}"#);
        assert_eq!(
            frames_as_strings(frames),
            vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]
        );
    }

    #[test]
    fn test_partial_frame_across_reads() {
        let mut framer = Framer::new();
        assert!(framer.push(br#"{"status":"#).is_empty());
        assert!(framer.pending() > 0);

        let frames = framer.push(br#"200}"#);
        assert_eq!(frames_as_strings(frames), vec![r#"{"status":200}"#]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_nested_objects() {
        let mut framer = Framer::new();
        let frames = framer.push(br#"{"body":{"unit":{"symbol":"C"}}}"#);
        assert_eq!(
            frames_as_strings(frames),
            vec![r#"{"body":{"unit":{"symbol":"C"}}}"#]
        );
    }

    #[test]
    fn test_brace_inside_string_value() {
        let mut framer = Framer::new();
        let frames = framer.push(br#"{"note":"a}b{c"}"#);
        assert_eq!(frames_as_strings(frames), vec![r#"{"note":"a}b{c"}"#]);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let mut framer = Framer::new();
        let frames = framer.push(br#"{"note":"say \"}\" loud"}"#);
        assert_eq!(
            frames_as_strings(frames),
            vec![r#"{"note":"say \"}\" loud"}"#]
        );
    }

    #[test]
    fn test_interframe_noise_discarded() {
        let mut framer = Framer::new();
        let frames = framer.push(b"\r\n  {\"a\":1}\n\n{\"b\":2}");
        assert_eq!(frames_as_strings(frames), vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_byte_by_byte_feed() {
        let mut framer = Framer::new();
        let input = br#"{"a":{"b":"}"}}{"c":2}"#;

        let mut frames = Vec::new();
        for &byte in input.iter() {
            frames.extend(framer.push(&[byte]));
        }

        assert_eq!(
            frames_as_strings(frames),
            vec![r#"{"a":{"b":"}"}}"#, r#"{"c":2}"#]
        );
    }

    proptest! {
        // Every concatenation of well-formed objects yields exactly one frame
        // per object, in arrival order, for any chunking of the byte stream.
        #[test]
        fn prop_one_frame_per_object(
            values in proptest::collection::vec(
                proptest::collection::btree_map("[a-z]{1,8}", 0i64..1000, 1..4),
                1..8,
            ),
            chunk in 1usize..16,
        ) {
            let objects: Vec<String> = values
                .iter()
                .map(|m| serde_json::to_string(m).expect("serialize"))
                .collect();
            let stream = objects.concat().into_bytes();

            let mut framer = Framer::new();
            let mut frames = Vec::new();
            for piece in stream.chunks(chunk) {
                frames.extend(framer.push(piece));
            }

            prop_assert_eq!(frames_as_strings(frames), objects);
            prop_assert_eq!(framer.pending(), 0);
        }
    }
}
