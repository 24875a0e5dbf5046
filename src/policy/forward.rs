//! Transparent relaying policies.

use tracing::info;

use super::{BoxFuture, HandlerPolicy};
use crate::error::Result;
use crate::link::Link;
use crate::protocol::Role;

/// Relays every chunk unmodified to the other side.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forward;

impl HandlerPolicy for Forward {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { link.send(origin.opposite(), chunk).await })
    }
}

/// [`Forward`] plus a hex dump of every chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostic {
    inner: Forward,
}

impl Diagnostic {
    /// Create a diagnostic relay.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandlerPolicy for Diagnostic {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        info!(
            direction = origin.direction(),
            len = chunk.len(),
            "{}",
            hex::encode(chunk)
        );
        self.inner.on_chunk(chunk, origin, link)
    }
}
