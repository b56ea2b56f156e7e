//! Collaborator interfaces for lobbybot.
//!
//! The coordinator talks to three external systems, each behind a narrow
//! trait so the lobby logic can be driven by in-memory fakes in tests:
//!
//! - [`Hub`] — the real-time multiplayer channel we invoke commands on.
//!   Its events arrive on an `mpsc` receiver handed out at connect time.
//! - [`Catalog`] — beatmap lookups, difficulty attributes, users, rooms.
//! - [`Chat`] — the room's chat channel.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — [`WebSocketHub`] over `tokio-tungstenite`
//! - `rest` (default) — [`RestClient`] over `reqwest`

mod chat;
mod error;
#[cfg(feature = "rest")]
mod rest;
#[cfg(feature = "websocket")]
mod websocket;

pub use chat::send_with_retry;
pub use error::{ApiError, HubError};
#[cfg(feature = "rest")]
pub use rest::RestClient;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketHub;

use std::future::Future;

use lobbybot_protocol::{
    Beatmap, BeatmapId, ChannelId, ChatMessage, HubCommand, NewRoom, Room, User,
    UserId,
};

/// Invokes commands on the real-time hub.
///
/// The returned futures are `Send` so callers can run invocations from
/// spawned tasks without blocking the coordinator loop.
pub trait Hub: Send + Sync + 'static {
    /// Runs a command and waits for the hub to acknowledge it.
    ///
    /// # Errors
    /// [`HubError::Rejected`] when the hub refuses the command (e.g. removing
    /// the last playlist item), other variants for connection trouble.
    fn invoke(
        &self,
        command: HubCommand,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Read-mostly lookups against the REST catalog.
///
/// Lookups have no side effects, which is what lets the item search throw
/// away results from probes that lost the race.
pub trait Catalog: Send + Sync + 'static {
    /// Fetches a beatmap by id.
    fn lookup_beatmap(
        &self,
        id: BeatmapId,
    ) -> impl Future<Output = Result<Beatmap, ApiError>> + Send;

    /// Computes the star rating of a beatmap for a ruleset.
    fn beatmap_attributes(
        &self,
        id: BeatmapId,
        ruleset: &str,
    ) -> impl Future<Output = Result<f64, ApiError>> + Send;

    /// Fetches a user profile.
    fn lookup_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Fetches the profile of the account we're logged in as.
    fn me(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Creates a multiplayer room.
    fn create_room(
        &self,
        room: &NewRoom,
    ) -> impl Future<Output = Result<Room, ApiError>> + Send;
}

/// The room's chat channel.
pub trait Chat: Send + Sync + 'static {
    /// Posts a message. `is_action` renders it as a `/me` action.
    fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
        is_action: bool,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Reads messages newer than `since` (a message id), oldest first.
    fn poll_messages(
        &self,
        channel: ChannelId,
        since: u64,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, ApiError>> + Send;
}
