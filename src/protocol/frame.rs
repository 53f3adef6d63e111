//! Frame struct and wire encoding.
//!
//! A frame is an ASCII decimal byte length, a line feed, then exactly that
//! many payload bytes:
//!
//! ```text
//! FRAME := ASCII-decimal(byteLength(JSON)) "\n" JSON
//! ```
//!
//! # Example
//!
//! ```
//! use jsonwire_client::protocol::{build_frame, Frame};
//!
//! assert_eq!(build_frame(br#"{"sq":1}"#), b"8\n{\"sq\":1}");
//!
//! let frame = Frame::from_slice(b"hello");
//! assert_eq!(frame.len(), 5);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Separator between the length prefix and the payload.
pub const LENGTH_DELIMITER: u8 = b'\n';

/// Smallest payload size accepted on the wire. Declared sizes below this
/// are treated as corrupt and skipped.
pub const MIN_PAYLOAD_SIZE: usize = 2;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from payload bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_slice(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Declared length of the frame (payload byte count).
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode this frame for the wire.
    pub fn encode(&self) -> Bytes {
        build_frame_bytes(&self.payload)
    }
}

/// Encode the length prefix (`"<len>\n"`) for a payload of `len` bytes.
pub fn length_prefix(len: usize) -> Bytes {
    let digits = len.to_string();
    let mut buf = BytesMut::with_capacity(digits.len() + 1);
    buf.put_slice(digits.as_bytes());
    buf.put_u8(LENGTH_DELIMITER);
    buf.freeze()
}

/// Build a complete frame (prefix + payload) as a byte vector.
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let prefix = length_prefix(payload.len());
    let mut frame = Vec::with_capacity(prefix.len() + payload.len());
    frame.extend_from_slice(&prefix);
    frame.extend_from_slice(payload);
    frame
}

/// Build a complete frame as `Bytes`.
pub fn build_frame_bytes(payload: &[u8]) -> Bytes {
    Bytes::from(build_frame(payload))
}
