//! MsgPack codec using `rmp-serde`.
//!
//! Always encodes with `to_vec_named` so structs travel as maps keyed by
//! field name, which is what decoding into `serde_json::Value` expects.
//!
//! Message bodies are decoded through a widening visitor, since a JSON
//! value cannot hold everything MessagePack can:
//!
//! | MessagePack      | body                          |
//! |------------------|-------------------------------|
//! | bin              | array of byte values          |
//! | ext              | `[type, [bytes...]]`          |
//! | non-string key   | key rendered as JSON text     |
//! | NaN / infinity   | `null`                        |
//!
//! # Example
//!
//! ```
//! use wirebridge::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Search {
//!     gen_id: u32,
//!     follow: bool,
//! }
//!
//! let msg = Search { gen_id: 11971, follow: true };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Search = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use std::fmt;

use serde::de::{Deserialize, Deserializer, Error, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

use super::{Decoded, MessageCodec};
use crate::error::Result;

/// MessagePack codec for structured payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Decode one value from the front of `bytes`.
    ///
    /// Returns the value and the number of bytes it occupied. Anything after
    /// the first value is left unread.
    pub fn decode_prefix<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize)> {
        let mut reader = bytes;
        let value = rmp_serde::from_read(&mut reader)?;
        Ok((value, bytes.len() - reader.len()))
    }
}

/// Any MessagePack value, widened to fit a JSON body.
struct WireValue(Value);

impl<'de> Deserialize<'de> for WireValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(WireValueVisitor).map(WireValue)
    }
}

struct WireValueVisitor;

impl<'de> Visitor<'de> for WireValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any MessagePack value")
    }

    fn visit_bool<E: Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E: Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn visit_unit<E: Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(self)
    }

    // ext arrives as a newtype around (type, data)
    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        d: D,
    ) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(WireValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut object = Map::new();
        while let Some((WireValue(key), WireValue(value))) = map.next_entry()? {
            let key = match key {
                Value::String(s) => s,
                other => other.to_string(),
            };
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}

impl MessageCodec for MsgPackCodec {
    fn decode(&self, payload: &[u8]) -> Result<Decoded> {
        let (WireValue(body), consumed) = Self::decode_prefix::<WireValue>(payload)?;
        Ok(Decoded { body, consumed })
    }

    fn encode(&self, body: &Value) -> Result<Vec<u8>> {
        Self::encode(body)
    }
}
