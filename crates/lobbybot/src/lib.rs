//! # lobbybot
//!
//! A bot that hosts a multiplayer room on its own: it keeps the playlist
//! stocked with random maps in a difficulty range, removes items that
//! break the room's rules, starts the match once enough players are ready,
//! and lets the room vote to skip.
//!
//! The work is split across the workspace:
//!
//! - `lobbybot-protocol`: wire types
//! - `lobbybot-transport`: hub, catalog and chat clients
//! - `lobbybot-lobby`: who is here and who is ready
//! - `lobbybot-timer`: the start countdown
//! - `lobbybot-room`: the coordinator
//!
//! This crate ties them together: [`Settings`] from the command line and
//! environment, [`RoomBot`] for the startup sequence, [`ChatPoller`] to
//! feed chat into the coordinator.

mod bot;
mod chat;
mod error;
mod settings;

pub use bot::{RoomBot, RunningBot, QUEUE_MODE};
pub use chat::{ChatPoller, POLL_INTERVAL};
pub use error::LobbybotError;
pub use settings::{default_room_name, RoomSettings, Settings};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback` (e.g. `"info"`) is used.
pub fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Common imports for embedding the bot.
pub mod prelude {
    pub use crate::{LobbybotError, RoomBot, RoomSettings, RunningBot, Settings};
    pub use lobbybot_protocol::{ChannelId, HubCommand, HubEvent, PlaylistItem, User, UserId};
    pub use lobbybot_room::{DifficultyRange, LobbyConfig, LobbyHandle, LobbyStatus};
    pub use lobbybot_timer::TimerState;
    pub use lobbybot_transport::{Catalog, Chat, Hub, RestClient, WebSocketHub};
}
