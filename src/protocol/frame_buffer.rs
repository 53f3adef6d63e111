//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForLength`: need a complete `"<digits>\n"` line
//! - `WaitingForPayload`: length parsed, need N more payload bytes
//!
//! A declared size below [`MIN_PAYLOAD_SIZE`], or a prefix line that is not a
//! decimal number, is logged and skipped; scanning continues with the bytes
//! that follow in the same pass.
//!
//! # Example
//!
//! ```
//! use jsonwire_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! assert_eq!(buffer.push(b"5\nhel").count(), 0);
//!
//! let frames: Vec<_> = buffer.push(b"lo5\nworld").collect();
//! assert_eq!(frames[0].payload(), b"hello");
//! assert_eq!(frames[1].payload(), b"world");
//! ```

use bytes::BytesMut;

use super::frame::{Frame, LENGTH_DELIMITER, MIN_PAYLOAD_SIZE};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a complete length line.
    WaitingForLength,
    /// Length parsed, waiting for payload bytes.
    WaitingForPayload { size: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// All data is stored in a single `BytesMut`; bytes are removed from the
/// front as soon as they are attributed to a length prefix or a payload.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer. Default capacity: 64KB.
    pub fn new() -> Self {
        Self::with_capacity(64 * 1024)
    }

    /// Create a new frame buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForLength,
        }
    }

    /// Push data into the buffer and iterate the complete frames now available.
    ///
    /// Frames are extracted lazily as the iterator is advanced. Anything not
    /// consumed (a partial frame, or frames left behind when the iterator is
    /// dropped early) stays buffered for the next call.
    pub fn push(&mut self, data: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(data);
        Frames { buffer: self }
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns `None` when more data is needed.
    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::WaitingForLength => {
                    let pos = self.buffer.iter().position(|&b| b == LENGTH_DELIMITER)?;
                    let line = self.buffer.split_to(pos + 1);
                    let digits = &line[..pos];

                    match parse_size(digits) {
                        Some(size) if size >= MIN_PAYLOAD_SIZE => {
                            self.state = State::WaitingForPayload { size };
                        }
                        Some(size) => {
                            tracing::error!(size, "Wrong payload size, skipping frame");
                        }
                        None => {
                            tracing::error!(
                                prefix = %String::from_utf8_lossy(digits),
                                "Unreadable length prefix, skipping"
                            );
                        }
                    }
                }

                State::WaitingForPayload { size } => {
                    if self.buffer.len() < size {
                        return None;
                    }

                    let payload = self.buffer.split_to(size).freeze();
                    self.state = State::WaitingForLength;

                    return Some(Frame::new(payload));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the frames extracted by [`FrameBuffer::push`].
pub struct Frames<'a> {
    buffer: &'a mut FrameBuffer,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.buffer.try_extract_one()
    }
}

fn parse_size(digits: &[u8]) -> Option<usize> {
    std::str::from_utf8(digits).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    fn payloads(buffer: &mut FrameBuffer, data: &[u8]) -> Vec<Vec<u8>> {
        buffer.push(data).map(|f| f.payload.to_vec()).collect()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();

        let frames = payloads(&mut buffer, b"5\nhello");

        assert_eq!(frames, vec![b"hello".to_vec()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let frames = payloads(&mut buffer, b"5\nhello5\nworld");

        assert_eq!(frames, vec![b"hello".to_vec(), b"world".to_vec()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();

        assert!(payloads(&mut buffer, b"5\nhel").is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");
        assert_eq!(buffer.len(), 3);

        let frames = payloads(&mut buffer, b"lo");
        assert_eq!(frames, vec![b"hello".to_vec()]);
        assert_eq!(buffer.state_name(), "WaitingForLength");
    }

    #[test]
    fn test_fragmented_length_prefix() {
        let mut buffer = FrameBuffer::new();

        assert!(payloads(&mut buffer, b"1").is_empty());
        assert_eq!(buffer.state_name(), "WaitingForLength");
        assert!(payloads(&mut buffer, b"1\nhello").is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = payloads(&mut buffer, b" world");
        assert_eq!(frames, vec![b"hello world".to_vec()]);
    }

    #[test]
    fn test_no_delimiter_keeps_data() {
        let mut buffer = FrameBuffer::new();

        assert!(payloads(&mut buffer, b"123").is_empty());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_small_size_skipped_and_scanning_continues() {
        let mut buffer = FrameBuffer::new();

        let frames = payloads(&mut buffer, b"1\n0\n5\nhello");

        assert_eq!(frames, vec![b"hello".to_vec()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unparseable_prefix_skipped() {
        let mut buffer = FrameBuffer::new();

        let frames = payloads(&mut buffer, b"abc\n2\nok");

        assert_eq!(frames, vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frames = payloads(&mut buffer, b"5\nfirst6\nsec");
        assert_eq!(frames, vec![b"first".to_vec()]);
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = payloads(&mut buffer, b"ond");
        assert_eq!(frames, vec![b"second".to_vec()]);
    }

    #[test]
    fn test_lazy_iteration_leaves_rest_buffered() {
        let mut buffer = FrameBuffer::new();

        let first = buffer.push(b"2\nab2\ncd").next().unwrap();
        assert_eq!(first.payload(), b"ab");
        assert_eq!(buffer.len(), 4);

        let rest = payloads(&mut buffer, b"");
        assert_eq!(rest, vec![b"cd".to_vec()]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = build_frame(br#"{"sq":1}"#);

        let mut all = Vec::new();
        for byte in &frame_bytes {
            all.extend(payloads(&mut buffer, &[*byte]));
        }

        assert_eq!(all, vec![br#"{"sq":1}"#.to_vec()]);
    }

    #[test]
    fn test_every_split_point_yields_same_frames() {
        let messages: [&[u8]; 3] = [br#"{"sq":1}"#, br#"{"action":"ping"}"#, b"xy"];
        let mut stream = Vec::new();
        for m in messages {
            stream.extend(build_frame(m));
        }

        for a in 0..=stream.len() {
            for b in a..=stream.len() {
                let mut buffer = FrameBuffer::new();
                let mut out = payloads(&mut buffer, &stream[..a]);
                out.extend(payloads(&mut buffer, &stream[a..b]));
                out.extend(payloads(&mut buffer, &stream[b..]));

                let expected: Vec<Vec<u8>> = messages.iter().map(|m| m.to_vec()).collect();
                assert_eq!(out, expected, "split at {a}/{b}");
                assert!(buffer.is_empty());
            }
        }
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();

        let _ = payloads(&mut buffer, b"5\nhe");
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForLength");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_large_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = vec![b'a'; 1024 * 1024];

        let frames = payloads(&mut buffer, &build_frame(&payload));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1024 * 1024);
    }
}
