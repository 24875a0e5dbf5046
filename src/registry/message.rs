//! Structured message model.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded protocol message: its registry name and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Registry name of the message type.
    pub name: String,
    /// Decoded fields.
    pub body: Value,
}

impl Message {
    /// Create a message from its type name and body.
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// A message with no fields.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Value::Object(Default::default()))
    }

    /// Whether this message has type `name`.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Look up a top-level field.
    #[inline]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Look up a top-level text field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.body)
    }
}
