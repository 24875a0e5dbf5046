//! Write side of a session.
//!
//! A [`Link`] owns the write halves of both connections, addressed by
//! [`Role`]. Policies receive `&mut Link` on every chunk and use it to relay
//! or inject bytes. Every send writes the whole buffer and flushes, so bytes
//! reach the peer in the order policies emit them.
//!
//! ```text
//! primary reader ─┐                         ┌─► secondary writer
//!                 ├─► Session ─► Policy ─► Link
//! secondary reader┘                         └─► primary writer
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{Directional, Role};

/// Type-erased write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write halves of both connections plus per-side byte counters.
pub struct Link {
    /// Writers by role.
    writers: Directional<BoxedWriter>,
    /// Bytes written toward each role.
    sent: Directional<u64>,
}

impl Link {
    /// Create a link from the two write halves.
    pub fn new<P, S>(primary: P, secondary: S) -> Self
    where
        P: AsyncWrite + Send + Unpin + 'static,
        S: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writers: Directional::new(Box::new(primary), Box::new(secondary)),
            sent: Directional::default(),
        }
    }

    /// Write `bytes` to the connection of `to` and flush.
    pub async fn send(&mut self, to: Role, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let writer = self.writers.get_mut(to);
        writer.write_all(bytes).await?;
        writer.flush().await?;
        *self.sent.get_mut(to) += bytes.len() as u64;
        Ok(())
    }

    /// Total bytes written toward `to`.
    #[inline]
    pub fn bytes_sent(&self, to: Role) -> u64 {
        *self.sent.get(to)
    }

    /// Shut down both write halves.
    ///
    /// Errors are logged and ignored; the peer may already be gone.
    pub(crate) async fn shutdown(&mut self) {
        for role in [Role::Primary, Role::Secondary] {
            if let Err(e) = self.writers.get_mut(role).shutdown().await {
                debug!(%role, "writer shutdown failed: {}", e);
            }
        }
    }
}
