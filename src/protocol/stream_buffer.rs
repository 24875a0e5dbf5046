//! Per-direction byte accumulator and frame extractor.
//!
//! Uses `bytes::BytesMut` so extracted frames are zero-copy views of the
//! received data. Extraction only ever consumes from the front, and only
//! once a whole header and payload are present; an incomplete frame stays
//! in the buffer untouched until more bytes arrive.
//!
//! # Example
//!
//! ```
//! use wirebridge::protocol::{build_frame, Header, Role, StreamBuffer};
//!
//! let mut buffer = StreamBuffer::new(Role::Secondary);
//! let bytes = build_frame(&Header::new(3, None, 2), b"hi");
//!
//! buffer.append(&bytes[..3]);
//! assert!(buffer.try_extract_frame().is_none());
//!
//! buffer.append(&bytes[3..]);
//! let frame = buffer.try_extract_frame().unwrap();
//! assert_eq!(frame.payload(), b"hi");
//! assert!(buffer.is_empty());
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::Header;
use super::{Frame, Role};

/// Default initial capacity for each direction.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;

/// Buffer for accumulating incoming bytes from one origin and extracting
/// complete frames.
#[derive(Debug)]
pub struct StreamBuffer {
    /// Accumulated bytes not yet extracted.
    buffer: BytesMut,
    /// Which endpoint these bytes come from; decides the header shape.
    origin: Role,
}

impl StreamBuffer {
    /// Create an empty buffer for bytes sent by `origin`.
    pub fn new(origin: Role) -> Self {
        Self::with_capacity(origin, DEFAULT_BUFFER_CAPACITY)
    }

    /// Create an empty buffer with a custom initial capacity.
    pub fn with_capacity(origin: Role, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            origin,
        }
    }

    /// The endpoint this buffer reassembles.
    #[inline]
    pub fn origin(&self) -> Role {
        self.origin
    }

    /// Append raw bytes to the tail.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to cut one complete frame from the front of the buffer.
    ///
    /// Returns `None` and leaves the buffer untouched when the header or
    /// payload is still incomplete. A single append may hold zero, one or
    /// many frames, so call this in a loop until it returns `None`.
    pub fn try_extract_frame(&mut self) -> Option<Frame> {
        let header = Header::decode(&self.buffer, self.origin)?;
        let total = header.size() + header.payload_length as usize;
        if self.buffer.len() < total {
            return None;
        }

        let raw = self.buffer.split_to(total).freeze();
        let payload = raw.slice(header.size()..);
        Some(Frame::from_wire(header, payload, raw))
    }

    /// Append data and extract every frame it completes.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.append(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_frame() {
            frames.push(frame);
        }
        frames
    }

    /// The unread tail (bytes of an incomplete frame).
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the unread tail, leaving the buffer empty.
    pub fn take_pending(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    /// Get the number of buffered bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
