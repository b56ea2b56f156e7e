//! Error types for the protocol layer.
//!
//! Each crate in lobbybot defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning frames into bytes or back,
//! not in the network or in lobby bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an event name we don't model,
    /// missing required fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but breaks a protocol rule, e.g. a completion
    /// for an invocation id that was never issued.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
