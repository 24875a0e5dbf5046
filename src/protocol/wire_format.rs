//! Wire format encoding and decoding.
//!
//! Frame header layout:
//! ```text
//! ┌──────────────────────┬──────────────────────┬────────────────┐
//! │ Packed id            │ Counter              │ Payload length │
//! │ 2 bytes, uint16 BE   │ 4 bytes, uint32 BE   │ 0-3 bytes BE   │
//! │ id << 2 | len width  │ primary origin only  │ (len width)    │
//! └──────────────────────┴──────────────────────┴────────────────┘
//! ```
//!
//! The low two bits of the packed id give the width of the length field, so
//! a header is between 2 and 9 bytes long. Only frames sent by the primary
//! (client-side) endpoint carry the counter.

use super::Role;
use crate::error::{BridgeError, Result};

/// Size of the packed id field.
pub const PACKED_ID_SIZE: usize = 2;

/// Size of the counter field on primary-origin frames.
pub const COUNTER_SIZE: usize = 4;

/// Largest message id representable in 14 bits.
pub const MAX_MESSAGE_ID: u16 = 0x3FFF;

/// Largest payload representable with a 3-byte length field.
pub const MAX_PAYLOAD_SIZE: u32 = 0x00FF_FFFF;

/// Largest possible header (packed id + counter + 3-byte length).
pub const MAX_HEADER_SIZE: usize = PACKED_ID_SIZE + COUNTER_SIZE + 3;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message identifier (14 bits).
    pub id: u16,
    /// Sequence counter, present only on primary-origin frames.
    pub counter: Option<u32>,
    /// Width in bytes of the length field (0-3).
    pub len_width: u8,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a header using the narrowest length field for `payload_length`.
    pub fn new(id: u16, counter: Option<u32>, payload_length: u32) -> Self {
        Self {
            id,
            counter,
            len_width: len_width_for(payload_length),
            payload_length,
        }
    }

    /// Encoded size of this header.
    #[inline]
    pub fn size(&self) -> usize {
        PACKED_ID_SIZE
            + if self.counter.is_some() { COUNTER_SIZE } else { 0 }
            + self.len_width as usize
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use wirebridge::protocol::Header;
    ///
    /// let header = Header::new(1, Some(7), 100);
    /// assert_eq!(header.encode(), vec![0x00, 0x05, 0, 0, 0, 7, 100]);
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded header to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        debug_assert!(self.id <= MAX_MESSAGE_ID);
        debug_assert!(self.len_width <= 3);
        let packed = (self.id << 2) | u16::from(self.len_width);
        buf.extend_from_slice(&packed.to_be_bytes());
        if let Some(counter) = self.counter {
            buf.extend_from_slice(&counter.to_be_bytes());
        }
        let length = self.payload_length.to_be_bytes();
        buf.extend_from_slice(&length[4 - self.len_width as usize..]);
    }

    /// Decode a header sent by `origin` from the front of `buf`.
    ///
    /// Returns `None` if `buf` does not yet hold the whole header.
    pub fn decode(buf: &[u8], origin: Role) -> Option<Self> {
        if buf.len() < PACKED_ID_SIZE {
            return None;
        }
        let packed = u16::from_be_bytes([buf[0], buf[1]]);
        let len_width = (packed & 0b11) as u8;
        let mut offset = PACKED_ID_SIZE;

        let counter = if origin.carries_counter() {
            let bytes = buf.get(offset..offset + COUNTER_SIZE)?;
            offset += COUNTER_SIZE;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        } else {
            None
        };

        let length_bytes = buf.get(offset..offset + len_width as usize)?;
        let payload_length = length_bytes
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

        Some(Self {
            id: packed >> 2,
            counter,
            len_width,
            payload_length,
        })
    }

    /// Check that this header can be put on the wire.
    pub fn validate(&self) -> Result<()> {
        if self.id > MAX_MESSAGE_ID {
            return Err(BridgeError::Protocol(format!(
                "Message id {} exceeds maximum {}",
                self.id, MAX_MESSAGE_ID
            )));
        }
        if self.payload_length > max_len_for_width(self.len_width) {
            return Err(BridgeError::Protocol(format!(
                "Payload size {} does not fit a {}-byte length field",
                self.payload_length, self.len_width
            )));
        }
        Ok(())
    }
}

/// Narrowest length-field width able to hold `payload_length`.
#[inline]
pub fn len_width_for(payload_length: u32) -> u8 {
    match payload_length {
        0 => 0,
        1..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 3,
    }
}

fn max_len_for_width(width: u8) -> u32 {
    match width {
        0 => 0,
        1 => 0xFF,
        2 => 0xFFFF,
        _ => MAX_PAYLOAD_SIZE,
    }
}
