//! Raw codec - opaque payloads.
//!
//! Registers a message id by name without interpreting its fields. The body
//! is `{"data": "<hex>"}` and decoding always consumes the whole payload, so
//! such entries can never trip the length check.
//!
//! # Example
//!
//! ```
//! use wirebridge::codec::{MessageCodec, RawCodec};
//!
//! let decoded = RawCodec.decode(b"\x01\xff").unwrap();
//! assert_eq!(decoded.body["data"], "01ff");
//! assert_eq!(RawCodec.encode(&decoded.body).unwrap(), b"\x01\xff");
//! ```

use serde_json::{json, Value};

use super::{Decoded, MessageCodec};
use crate::error::{BridgeError, Result};

/// Body field holding the hex-encoded payload.
pub const RAW_DATA_FIELD: &str = "data";

/// Codec that keeps the payload as hex text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl MessageCodec for RawCodec {
    fn decode(&self, payload: &[u8]) -> Result<Decoded> {
        Ok(Decoded {
            body: json!({ RAW_DATA_FIELD: hex::encode(payload) }),
            consumed: payload.len(),
        })
    }

    fn encode(&self, body: &Value) -> Result<Vec<u8>> {
        let text = body
            .get(RAW_DATA_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        hex::decode(text).map_err(|e| BridgeError::Protocol(format!("Invalid raw payload: {}", e)))
    }
}
