//! Interception policies.
//!
//! A session hands every chunk it reads to exactly one [`HandlerPolicy`].
//! The policy decides what reaches the other side:
//!
//! - [`Forward`] - relays chunks untouched
//! - [`Diagnostic`] - relays and logs a hex dump
//! - [`Dispatch`] - relays, then decodes frames and calls back per message
//! - [`Inject`] - rewrites client counters, keeps history, runs automation
//!   and can send synthetic messages in either direction
//!
//! # Example
//!
//! ```ignore
//! use wirebridge::policy::{Dispatch, TraceMessages};
//!
//! let policy = Dispatch::new(registry.clone(), TraceMessages::new());
//! Session::new(client, server, policy).run().await?;
//! ```

mod dispatch;
mod forward;
mod history;
mod inject;

pub use dispatch::{Dispatch, FrameDecoder};
pub use forward::{Diagnostic, Forward};
pub use history::{History, Observed};
pub use inject::Inject;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tracing::info;

pub use crate::config::ConsumptionPolicy;
use crate::error::{BridgeError, Result};
use crate::link::Link;
use crate::protocol::Role;
use crate::registry::Message;

/// Boxed future returned by policy hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What to send when injecting.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Pre-built bytes, written as is.
    Raw(Bytes),
    /// A structured message, encoded through the registry.
    Message(Message),
}

impl From<Bytes> for Outbound {
    fn from(bytes: Bytes) -> Self {
        Outbound::Raw(bytes)
    }
}

impl From<Vec<u8>> for Outbound {
    fn from(bytes: Vec<u8>) -> Self {
        Outbound::Raw(Bytes::from(bytes))
    }
}

impl From<Message> for Outbound {
    fn from(message: Message) -> Self {
        Outbound::Message(message)
    }
}

/// A synthetic send requested from outside the relay loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    /// Side that receives the payload.
    pub target: Role,
    /// What to send.
    pub payload: Outbound,
}

impl Injection {
    /// Create an injection toward `target`.
    pub fn new(target: Role, payload: impl Into<Outbound>) -> Self {
        Self {
            target,
            payload: payload.into(),
        }
    }
}

/// Per-session interception hook.
///
/// `on_chunk` runs for every non-empty read, in arrival order, and is
/// awaited before the next read is handed over. Returning an error ends
/// the session.
pub trait HandlerPolicy: Send {
    /// Handle bytes read from `origin`.
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>>;

    /// Handle an injection queued through an
    /// [`InjectHandle`](crate::session::InjectHandle).
    ///
    /// Raw payloads are written to the target as is. Structured messages
    /// need a registry, so the default rejects them.
    fn on_injection<'a>(
        &'a mut self,
        injection: Injection,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match injection.payload {
                Outbound::Raw(bytes) => link.send(injection.target, &bytes).await,
                Outbound::Message(message) => Err(BridgeError::Protocol(format!(
                    "policy cannot encode structured message {}",
                    message.name
                ))),
            }
        })
    }
}

impl<P: HandlerPolicy + ?Sized> HandlerPolicy for Box<P> {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).on_chunk(chunk, origin, link)
    }

    fn on_injection<'a>(
        &'a mut self,
        injection: Injection,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).on_injection(injection, link)
    }
}

/// Receives every message a decoding policy accepted.
pub trait MessageCallback: Send {
    /// Called once per decoded message, in wire order.
    fn on_message(&mut self, message: &Message, origin: Role);
}

impl<F> MessageCallback for F
where
    F: FnMut(&Message, Role) + Send,
{
    fn on_message(&mut self, message: &Message, origin: Role) {
        self(message, origin)
    }
}

/// Callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallback;

impl MessageCallback for NoCallback {
    fn on_message(&mut self, _message: &Message, _origin: Role) {}
}

/// Callback that logs every decoded message with its direction.
///
/// Server-to-client messages whose type is muted are skipped; client
/// messages are always logged.
#[derive(Debug, Clone, Default)]
pub struct TraceMessages {
    muted: HashSet<String>,
}

impl TraceMessages {
    /// Log everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop logging server-to-client messages of type `name`.
    pub fn mute(mut self, name: impl Into<String>) -> Self {
        self.muted.insert(name.into());
        self
    }

    /// Whether a message of `name` from `origin` is logged.
    pub fn is_logged(&self, name: &str, origin: Role) -> bool {
        origin == Role::Primary || !self.muted.contains(name)
    }
}

impl MessageCallback for TraceMessages {
    fn on_message(&mut self, message: &Message, origin: Role) {
        if self.is_logged(&message.name, origin) {
            info!(direction = origin.direction(), "{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_callback() {
        let mut seen = Vec::new();
        {
            let mut callback = |message: &Message, origin: Role| {
                seen.push((message.name.clone(), origin));
            };
            MessageCallback::on_message(&mut callback, &Message::empty("Ping"), Role::Secondary);
        }
        assert_eq!(seen, vec![("Ping".to_string(), Role::Secondary)]);
    }

    #[test]
    fn test_trace_mutes_only_server_messages() {
        let trace = TraceMessages::new().mute("GameMapMovementMessage");

        assert!(!trace.is_logged("GameMapMovementMessage", Role::Secondary));
        assert!(trace.is_logged("GameMapMovementMessage", Role::Primary));
        assert!(trace.is_logged("ChatServerMessage", Role::Secondary));
    }

    #[test]
    fn test_outbound_conversions() {
        assert_eq!(
            Outbound::from(vec![1u8, 2]),
            Outbound::Raw(Bytes::from_static(&[1, 2]))
        );

        let injection = Injection::new(Role::Secondary, Message::new("Chat", json!({"content": "x"})));
        assert_eq!(injection.target, Role::Secondary);
        assert!(matches!(injection.payload, Outbound::Message(ref m) if m.is("Chat")));
    }
}
