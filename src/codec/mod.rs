//! Codec module - payload decoding/encoding for registry entries.
//!
//! Every registry entry owns a [`MessageCodec`]. A codec turns a frame
//! payload into a structured JSON body and reports how many payload bytes it
//! consumed; the dispatching policy compares that count with the length the
//! frame header declared.
//!
//! Two codecs ship with the crate:
//!
//! - [`MsgPackCodec`] - one MessagePack value per payload (`rmp-serde`)
//! - [`RawCodec`] - opaque payloads kept as hex, always fully consumed
//!
//! # Example
//!
//! ```
//! use wirebridge::codec::{MessageCodec, MsgPackCodec};
//! use serde_json::json;
//!
//! let body = json!({"content": "hello", "channel": 0});
//! let encoded = MessageCodec::encode(&MsgPackCodec, &body).unwrap();
//! let decoded = MessageCodec::decode(&MsgPackCodec, &encoded).unwrap();
//!
//! assert_eq!(decoded.body, body);
//! assert_eq!(decoded.consumed, encoded.len());
//! ```

mod msgpack;
mod raw;

pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;

use serde_json::Value;

use crate::error::Result;

/// Result of decoding one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Structured body.
    pub body: Value,
    /// Payload bytes read to produce `body`.
    pub consumed: usize,
}

/// Field-level codec for one message type.
pub trait MessageCodec: Send + Sync + 'static {
    /// Decode a payload. Fails when the payload is too short for the type.
    fn decode(&self, payload: &[u8]) -> Result<Decoded>;

    /// Encode a structured body into payload bytes.
    fn encode(&self, body: &Value) -> Result<Vec<u8>>;
}
