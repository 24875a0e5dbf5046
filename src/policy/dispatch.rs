//! Decoding policy.
//!
//! [`Dispatch`] relays every chunk first, so the peer never waits on
//! decoding, then reassembles frames per direction and hands each decoded
//! message to a [`MessageCallback`].
//!
//! Frames whose id is not registered are skipped. A registered frame that
//! does not decode to its declared length means the registry no longer
//! matches the live protocol; that is fatal and ends the session.

use std::sync::Arc;

use tracing::debug;

use super::{BoxFuture, HandlerPolicy, MessageCallback};
use crate::config::ConsumptionPolicy;
use crate::error::{BridgeError, Result};
use crate::link::Link;
use crate::protocol::{Directional, Frame, Role, StreamBuffer};
use crate::registry::{Message, MessageRegistry};

/// Turns frames into messages and enforces the consumption check.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    registry: Arc<MessageRegistry>,
    consumption: ConsumptionPolicy,
}

impl FrameDecoder {
    /// Decoder requiring exact consumption.
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self {
            registry,
            consumption: ConsumptionPolicy::Exact,
        }
    }

    /// Set the accepted decode leftovers.
    pub fn with_consumption(mut self, consumption: ConsumptionPolicy) -> Self {
        self.consumption = consumption;
        self
    }

    /// The registry in use.
    #[inline]
    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    /// Decode one frame.
    ///
    /// Returns `Ok(None)` for ids the registry does not know.
    pub fn decode(&self, frame: &Frame) -> Result<Option<Message>> {
        let Some(entry) = self.registry.lookup(frame.id()) else {
            debug!(id = frame.id(), len = frame.declared_len(), "no registry entry, skipping");
            return Ok(None);
        };

        let declared = frame.declared_len();
        let decoded = entry
            .decode(frame.payload())
            .map_err(|e| BridgeError::DecodeInvariant {
                id: frame.id(),
                name: entry.name().to_string(),
                declared,
                consumed: 0,
                detail: e.to_string(),
            })?;

        if !self.consumption.accepts(declared, decoded.consumed) {
            let detail = if decoded.consumed > declared {
                "codec read past the payload".to_string()
            } else {
                format!("{} bytes left unread", declared - decoded.consumed)
            };
            return Err(BridgeError::DecodeInvariant {
                id: frame.id(),
                name: entry.name().to_string(),
                declared,
                consumed: decoded.consumed,
                detail,
            });
        }

        Ok(Some(Message::new(entry.name(), decoded.body)))
    }
}

/// Relays raw chunks and calls back once per decoded message.
pub struct Dispatch<C> {
    decoder: FrameDecoder,
    buffers: Directional<StreamBuffer>,
    callback: C,
}

impl<C: MessageCallback> Dispatch<C> {
    /// Create a dispatching policy over `registry`.
    pub fn new(registry: Arc<MessageRegistry>, callback: C) -> Self {
        Self {
            decoder: FrameDecoder::new(registry),
            buffers: Directional::from_fn(StreamBuffer::new),
            callback,
        }
    }

    /// Set the accepted decode leftovers.
    pub fn with_consumption(mut self, consumption: ConsumptionPolicy) -> Self {
        self.decoder = self.decoder.with_consumption(consumption);
        self
    }

    /// The callback.
    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Bytes buffered for `origin` that do not yet form a frame.
    pub fn pending(&self, origin: Role) -> usize {
        self.buffers.get(origin).len()
    }

    fn drain(&mut self, origin: Role) -> Result<()> {
        let buffer = self.buffers.get_mut(origin);
        while let Some(frame) = buffer.try_extract_frame() {
            if let Some(message) = self.decoder.decode(&frame)? {
                self.callback.on_message(&message, origin);
            }
        }
        Ok(())
    }
}

impl<C: MessageCallback> HandlerPolicy for Dispatch<C> {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            link.send(origin.opposite(), chunk).await?;
            self.buffers.get_mut(origin).append(chunk);
            self.drain(origin)
        })
    }
}
