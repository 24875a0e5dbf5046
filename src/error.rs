//! Error types for wirebridge.

use thiserror::Error;

/// Main error type for all relay operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error on either connection. Ends the session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config, dumps).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (malformed header, oversized payload, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A registered message did not decode to exactly its declared length.
    ///
    /// The registry and the live protocol have drifted apart; the session
    /// cannot continue safely.
    #[error(
        "Decode invariant violated for {name} (id {id}): declared {declared} bytes, consumed {consumed} ({detail})"
    )]
    DecodeInvariant {
        /// Message id from the frame header.
        id: u16,
        /// Registry name for the id.
        name: String,
        /// Payload length announced by the header.
        declared: usize,
        /// Bytes the codec actually consumed.
        consumed: usize,
        /// Codec failure or leftover description.
        detail: String,
    },

    /// A structured message names a type the registry does not know.
    #[error("Unknown message name: {0}")]
    UnknownMessageName(String),

    /// Persistence or reporting sink failure.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The session is gone.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
