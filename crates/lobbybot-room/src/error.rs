//! Error types for the lobby coordinator.

use lobbybot_protocol::PlaylistItemId;
use lobbybot_transport::{ApiError, HubError};

/// Errors from coordinator operations and its background tasks.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The coordinator has stopped and its command channel is closed.
    #[error("lobby is unavailable")]
    Unavailable,

    /// A hub command failed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A catalog or chat call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A rejected item could neither be removed nor replaced.
    #[error("could not remove or replace playlist item {0}")]
    RemediationFailed(PlaylistItemId),
}
