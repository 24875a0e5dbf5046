//! Registry module - message model and id/name/codec lookup.
//!
//! Provides:
//! - [`Message`] - a decoded message (type name + JSON body)
//! - [`MessageRegistry`] - maps wire ids to names and codecs

mod message;
mod table;

pub use message::Message;
pub use table::{MessageRegistry, RegistryEntry};
