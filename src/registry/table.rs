//! Message registry mapping wire ids to names and codecs.
//!
//! The registry is read-only once a session starts; sessions share it
//! through an `Arc`. It is expected to cover only part of the live
//! protocol, so lookups for unknown ids return `None` rather than failing.
//!
//! # Example
//!
//! ```
//! use wirebridge::registry::{Message, MessageRegistry};
//! use serde_json::json;
//!
//! let mut registry = MessageRegistry::new();
//! registry.register_msgpack(861, "ChatClientMultiMessage").unwrap();
//!
//! let msg = Message::new("ChatClientMultiMessage", json!({"content": "hi"}));
//! let (id, payload) = registry.encode(&msg).unwrap();
//! assert_eq!(id, 861);
//!
//! let entry = registry.lookup(id).unwrap();
//! assert_eq!(entry.decode(&payload).unwrap().body, msg.body);
//! ```

use std::collections::HashMap;
use std::fmt;

use super::Message;
use crate::codec::{Decoded, MessageCodec, MsgPackCodec, RawCodec};
use crate::error::{BridgeError, Result};
use crate::protocol::MAX_MESSAGE_ID;

/// One registered message type.
pub struct RegistryEntry {
    /// Wire id.
    id: u16,
    /// Message type name.
    name: String,
    /// Field-level codec.
    codec: Box<dyn MessageCodec>,
}

impl RegistryEntry {
    /// Wire id of this type.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Name of this type.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode a payload of this type.
    pub fn decode(&self, payload: &[u8]) -> Result<Decoded> {
        self.codec.decode(payload)
    }

    /// Encode a body of this type.
    pub fn encode(&self, body: &serde_json::Value) -> Result<Vec<u8>> {
        self.codec.encode(body)
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry mapping message ids and names to codecs.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    /// Entries by wire id.
    by_id: HashMap<u16, RegistryEntry>,
    /// Name to wire id mapping (for encoding).
    id_by_name: HashMap<String, u16>,
}

impl MessageRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type with its codec.
    ///
    /// Fails if the id does not fit the wire format or if the id or name is
    /// already taken.
    pub fn register(
        &mut self,
        id: u16,
        name: &str,
        codec: impl MessageCodec,
    ) -> Result<&mut Self> {
        if id > MAX_MESSAGE_ID {
            return Err(BridgeError::Config(format!(
                "Message id {} for {} exceeds maximum {}",
                id, name, MAX_MESSAGE_ID
            )));
        }
        if let Some(existing) = self.by_id.get(&id) {
            return Err(BridgeError::Config(format!(
                "Message id {} already registered as {}",
                id, existing.name
            )));
        }
        if self.id_by_name.contains_key(name) {
            return Err(BridgeError::Config(format!(
                "Message name {} already registered",
                name
            )));
        }

        self.by_id.insert(
            id,
            RegistryEntry {
                id,
                name: name.to_string(),
                codec: Box::new(codec),
            },
        );
        self.id_by_name.insert(name.to_string(), id);
        Ok(self)
    }

    /// Register a MessagePack-encoded message type.
    pub fn register_msgpack(&mut self, id: u16, name: &str) -> Result<&mut Self> {
        self.register(id, name, MsgPackCodec)
    }

    /// Register a message type whose payload is kept opaque.
    pub fn register_raw(&mut self, id: u16, name: &str) -> Result<&mut Self> {
        self.register(id, name, RawCodec)
    }

    /// Get an entry by wire id.
    pub fn lookup(&self, id: u16) -> Option<&RegistryEntry> {
        self.by_id.get(&id)
    }

    /// Get the wire id for a message name.
    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.id_by_name.get(name).copied()
    }

    /// Get the message name for a wire id.
    pub fn name_of(&self, id: u16) -> Option<&str> {
        self.by_id.get(&id).map(RegistryEntry::name)
    }

    /// Encode a message, returning its wire id and payload.
    pub fn encode(&self, message: &Message) -> Result<(u16, Vec<u8>)> {
        let id = self
            .id_of(&message.name)
            .ok_or_else(|| BridgeError::UnknownMessageName(message.name.clone()))?;
        let entry = &self.by_id[&id];
        Ok((id, entry.encode(&message.body)?))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
