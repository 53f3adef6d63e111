//! Protocol module - wire format, framing, and packet types.
//!
//! This module implements the length-prefixed JSON protocol:
//! - `"<decimal length>\n<json>"` frame encoding
//! - Frame buffer for accumulating partial reads
//! - Packet type with request/response classification

mod frame;
mod frame_buffer;
mod packet;

pub use frame::{
    build_frame, build_frame_bytes, length_prefix, Frame, LENGTH_DELIMITER, MIN_PAYLOAD_SIZE,
};
pub use frame_buffer::{FrameBuffer, Frames};
pub use packet::{Packet, PacketKind, ACTION_FIELD, SQ_FIELD};
