//! # wirebridge
//!
//! Intercepting relay for a length/id-framed binary protocol.
//!
//! A bridge sits between a client and a server, relays their traffic, and
//! can decode frames into structured messages or inject synthetic ones
//! without breaking the server's sequence-counter check.
//!
//! ## Architecture
//!
//! - **Session** ([`Session`]): owns both connections, waits for readable
//!   data, and hands every chunk to one policy
//! - **Policies** ([`policy`]): `Forward`, `Diagnostic`, `Dispatch`, `Inject`
//! - **Framing** ([`protocol`]): per-direction reassembly into frames
//! - **Registry** ([`registry`]): wire id to message name and codec
//! - **Sequence** ([`sequence`]): keeps client counters gapless around
//!   injected frames
//! - **Automation** ([`automation`]): control-token driven query scheduler
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wirebridge::{policy::Inject, registry::MessageRegistry, Session};
//!
//! #[tokio::main]
//! async fn main() -> wirebridge::Result<()> {
//!     let mut registry = MessageRegistry::new();
//!     registry.register_msgpack(861, "ChatClientMultiMessage")?;
//!
//!     let (client, _) = listener.accept().await?;
//!     let server = tokio::net::TcpStream::connect(upstream).await?;
//!
//!     Session::new(client, server, Inject::new(Arc::new(registry)))
//!         .run()
//!         .await
//! }
//! ```

pub mod automation;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod pacing;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod sequence;
pub mod session;
pub mod sink;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use link::Link;
pub use policy::HandlerPolicy;
pub use session::{InjectHandle, Session};
