//! Protocol module - roles, wire format, framing, and frame types.
//!
//! This module implements the framing shared by both directions:
//! - Packed id header with an optional counter and variable length field
//! - Stream buffer for reassembling frames from partial reads
//! - Frame struct keeping both the decoded header and the raw bytes

mod frame;
mod role;
mod stream_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use role::{Directional, Role};
pub use stream_buffer::{StreamBuffer, DEFAULT_BUFFER_CAPACITY};
pub use wire_format::{
    len_width_for, Header, COUNTER_SIZE, MAX_HEADER_SIZE, MAX_MESSAGE_ID, MAX_PAYLOAD_SIZE,
    PACKED_ID_SIZE,
};
