//! Command-line and environment settings.
//!
//! Every flag can also come from the environment, and `main` loads a
//! `.env` file with `dotenvy` before parsing, so a deployment usually just
//! drops its secrets there.

use std::time::Duration;

use clap::Parser;
use lobbybot_protocol::UserId;
use lobbybot_room::{DifficultyRange, LobbyConfig};

use crate::LobbybotError;

/// Settings for one bot process.
#[derive(Parser, Debug, Clone)]
#[command(name = "lobbybot", version, about = "Hosts a multiplayer room that plays random maps")]
pub struct Settings {
    /// Base URL of the REST API.
    #[arg(long, env = "LOBBYBOT_API_URL", default_value = "https://osu.ppy.sh")]
    pub api_url: String,

    /// WebSocket URL of the multiplayer hub.
    #[arg(long, env = "LOBBYBOT_HUB_URL", default_value = "wss://spectator.ppy.sh/multiplayer")]
    pub hub_url: String,

    /// Bearer token for both the API and the hub.
    #[arg(long, env = "LOBBYBOT_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// User allowed to run privileged commands.
    #[arg(long, env = "OWNER_ID")]
    pub owner_id: Option<u64>,

    /// Room name. Defaults to one built from the difficulty range.
    #[arg(long, env = "LOBBYBOT_ROOM_NAME")]
    pub room_name: Option<String>,

    #[arg(long, env = "LOBBYBOT_ROOM_PASSWORD", default_value = "", hide_env_values = true)]
    pub room_password: String,

    /// Lowest allowed star rating.
    #[arg(long, env = "LOBBYBOT_MIN_DIFF", default_value_t = 3.99)]
    pub min_diff: f64,

    /// Highest allowed star rating.
    #[arg(long, env = "LOBBYBOT_MAX_DIFF", default_value_t = 7.99)]
    pub max_diff: f64,

    /// Longest allowed map, in seconds.
    #[arg(long, env = "LOBBYBOT_MAX_LENGTH", default_value_t = 600)]
    pub max_length: u32,

    /// Answer to `!discord`.
    #[arg(long, env = "DISCORD_LINK")]
    pub discord_link: Option<String>,

    /// Concurrent lookups per random map search.
    #[arg(long, env = "LOBBYBOT_PROBES", default_value_t = 16)]
    pub probes: usize,

    /// Seconds a random map search may take.
    #[arg(long, env = "LOBBYBOT_SEARCH_TIMEOUT", default_value_t = 60)]
    pub search_timeout: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_filter: String,
}

/// Name and password of the room to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub name: String,
    pub password: String,
}

impl Settings {
    /// Rejects settings that parse but can't work.
    ///
    /// # Errors
    /// [`LobbybotError::Settings`] naming the offending setting.
    pub fn check(&self) -> Result<(), LobbybotError> {
        if self.access_token.trim().is_empty() {
            return Err(LobbybotError::Settings("access token is empty".into()));
        }
        if !self.min_diff.is_finite() || !self.max_diff.is_finite() {
            return Err(LobbybotError::Settings(
                "difficulty bounds must be numbers".into(),
            ));
        }
        Ok(())
    }

    /// The coordinator config these settings describe.
    pub fn to_lobby_config(&self) -> LobbyConfig {
        LobbyConfig {
            range: DifficultyRange::new(self.min_diff, self.max_diff),
            max_length: self.max_length,
            probes: self.probes,
            search_timeout: Duration::from_secs(self.search_timeout),
            discord_link: self.discord_link.clone(),
            owner: self.owner_id.map(UserId),
            ..LobbyConfig::default()
        }
        .validated()
    }

    /// The room to create, named after the validated difficulty range
    /// unless a name is configured.
    pub fn room(&self) -> RoomSettings {
        let name = match &self.room_name {
            Some(name) => name.clone(),
            None => default_room_name(self.to_lobby_config().range),
        };
        RoomSettings {
            name,
            password: self.room_password.clone(),
        }
    }
}

pub fn default_room_name(range: DifficultyRange) -> String {
    format!(
        "BOTROOM /// {} - {}*  /// RANDOM MAPS /// !help /// !discord /// !source",
        range.min, range.max
    )
}
