//! The lobby coordinator for lobbybot.
//!
//! One room, one actor. Hub events and chat commands are fed to a pure
//! [`Lobby`] state machine that returns [`Effect`]s; the actor
//! loop runs those effects as background tasks so slow catalog or hub
//! calls never hold up the next event.
//!
//! # Key types
//!
//! - [`LobbyConfig`] — difficulty range, max length, search and timer settings
//! - [`Lobby`] — readiness, auto-start, skip votes, playlist cache
//! - [`ItemSearch`] — racing random-beatmap probes that resolve once
//! - [`validate::check`] — the playlist item policy
//! - [`LobbyHandle`] — talk to a running coordinator

mod actor;
mod autostart;
pub mod commands;
mod config;
mod error;
mod lobby;
pub mod mods;
mod playlist;
mod search;
mod task;
pub mod validate;

pub use actor::{spawn_lobby, LobbyHandle, Services};
pub use autostart::{evaluate, Evaluation};
pub use commands::ChatCommand;
pub use config::{DefaultItem, DifficultyRange, LobbyConfig};
pub use error::LobbyError;
pub use lobby::{ChatSender, Effect, Lobby, LobbyStatus};
pub use playlist::{PendingCount, PlaylistIndex};
pub use search::{ItemSearch, SearchCriteria, SearchMode, SearchOutcome};
pub use task::supervise;
pub use validate::{Rejection, ValidationRules, Verdict};
