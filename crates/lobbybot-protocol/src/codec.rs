//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The hub client doesn't care HOW frames are serialized; it just needs
//! something that implements the [`Codec`] trait. Today that's
//! [`JsonCodec`]; a binary codec could be dropped in without touching the
//! hub client.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is owned by the hub client,
/// which is shared between the reader task and every caller invoking a
/// command.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use lobbybot_protocol::{Codec, Frame, HubCommand, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let frame = Frame::Invocation {
///     id: 1,
///     command: HubCommand::StartMatch,
/// };
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Frame, HubEvent, UserId};

    #[test]
    fn test_json_codec_decodes_event_frame() {
        let raw = br#"{"type":"Event","event":{"type":"UserJoined","user_id":5}}"#;
        let frame: Frame = JsonCodec.decode(raw).unwrap();
        assert_eq!(
            frame,
            Frame::Event {
                event: HubEvent::UserJoined { user_id: UserId(5) }
            }
        );
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let result: Result<Frame, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_rejects_unknown_event() {
        let raw = br#"{"type":"Event","event":{"type":"Teleported","user_id":5}}"#;
        let result: Result<Frame, _> = JsonCodec.decode(raw);
        assert!(result.is_err());
    }
}
