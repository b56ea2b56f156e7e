//! Unified error type for the lobbybot binary.

use std::time::Duration;

use lobbybot_protocol::ProtocolError;
use lobbybot_room::LobbyError;
use lobbybot_transport::{ApiError, HubError};

/// Top-level error wrapping every crate-specific error.
///
/// Anything that reaches `main` as a `LobbybotError` ends the process:
/// the steady-state lobby logs and swallows its own failures, so only the
/// startup sequence produces these.
#[derive(Debug, thiserror::Error)]
pub enum LobbybotError {
    /// Encoding or decoding a hub frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connecting to or invoking on the hub failed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A catalog, user, room or chat request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The lobby coordinator failed or stopped.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// No qualifying item turned up to create the room with.
    #[error("no starter item found within {0:?}")]
    NoStarterItem(Duration),

    /// A required setting is missing or unusable.
    #[error("invalid setting: {0}")]
    Settings(String),
}
