//! Frame struct with typed accessors.
//!
//! Represents one complete protocol unit. Keeps the exact bytes it was cut
//! from so unmodified frames can be relayed without re-encoding.
//!
//! # Example
//!
//! ```
//! use wirebridge::protocol::{build_frame, Frame, Header, Role};
//!
//! let header = Header::new(1, None, 5);
//! let bytes = build_frame(&header, b"hello");
//! let frame = Frame::parse(bytes.into(), Role::Secondary).unwrap();
//!
//! assert_eq!(frame.id(), 1);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::Header;
use super::Role;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy slice of `raw`).
    pub payload: Bytes,
    /// Header and payload exactly as they appeared on the wire.
    raw: Bytes,
}

impl Frame {
    /// Build a frame from its header and payload, encoding the raw form.
    pub fn new(header: Header, payload: Bytes) -> Self {
        let raw = Bytes::from(build_frame(&header, &payload));
        let payload = raw.slice(header.size()..);
        Self {
            header,
            payload,
            raw,
        }
    }

    /// Assemble a frame from parts already cut from a stream.
    pub(crate) fn from_wire(header: Header, payload: Bytes, raw: Bytes) -> Self {
        Self {
            header,
            payload,
            raw,
        }
    }

    /// Parse a frame that spans `raw` exactly.
    ///
    /// Returns `None` unless `raw` holds one complete frame and nothing more.
    pub fn parse(raw: Bytes, origin: Role) -> Option<Self> {
        let header = Header::decode(&raw, origin)?;
        if raw.len() != header.size() + header.payload_length as usize {
            return None;
        }
        let payload = raw.slice(header.size()..);
        Some(Self {
            header,
            payload,
            raw,
        })
    }

    /// Get the message id.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Get the sequence counter, if this frame carries one.
    #[inline]
    pub fn counter(&self) -> Option<u32> {
        self.header.counter
    }

    /// Get the payload length announced by the header.
    #[inline]
    pub fn declared_len(&self) -> usize {
        self.header.payload_length as usize
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Header and payload exactly as received.
    #[inline]
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Total size on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }

    /// The same frame carrying `counter` instead of its current one.
    ///
    /// Keeps the original length-field width, so re-encoding with an
    /// unchanged counter reproduces the original bytes.
    pub fn with_counter(&self, counter: u32) -> Self {
        if self.header.counter == Some(counter) {
            return self.clone();
        }
        let header = Header {
            counter: Some(counter),
            ..self.header
        };
        Self::new(header, self.payload.clone())
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use wirebridge::protocol::{build_frame, Header};
///
/// let header = Header::new(1, Some(42), 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), 2 + 4 + 1 + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(header.size() + payload.len());
    header.encode_into(&mut buf);
    buf.extend_from_slice(payload);
    buf
}
