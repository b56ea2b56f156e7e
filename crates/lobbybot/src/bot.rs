//! `RoomBot`: the startup sequence and the running bot.
//!
//! Startup is strictly ordered and every step is fatal on failure:
//!
//! ```text
//! me ─► starter item search ─► create room ─► join room ─► spawn lobby ─► poll chat
//! ```
//!
//! Once the lobby actor is running, failures are handled inside it and
//! never reach the caller.

use std::sync::Arc;

use lobbybot_protocol::{HubCommand, HubEvent, NewPlaylistItem, NewRoom, Room, User};
use lobbybot_room::{
    mods, spawn_lobby, ItemSearch, LobbyConfig, LobbyHandle, SearchMode, SearchOutcome, Services,
};
use lobbybot_transport::{Catalog, Chat, Hub};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::chat::ChatPoller;
use crate::settings::RoomSettings;
use crate::LobbybotError;

/// Queue mode of the created room: every player's items take turns.
pub const QUEUE_MODE: &str = "all_players_round_robin";

/// A bot that hasn't started yet.
pub struct RoomBot<H, C, T> {
    config: LobbyConfig,
    room: RoomSettings,
    hub: Arc<H>,
    catalog: Arc<C>,
    chat: Arc<T>,
}

impl<H: Hub, C: Catalog, T: Chat> RoomBot<H, C, T> {
    pub fn new(
        config: LobbyConfig,
        room: RoomSettings,
        hub: Arc<H>,
        catalog: Arc<C>,
        chat: Arc<T>,
    ) -> Self {
        Self {
            config: config.validated(),
            room,
            hub,
            catalog,
            chat,
        }
    }

    /// Runs the startup sequence and hands back the running bot.
    ///
    /// `events` is the hub's event stream; the lobby takes it over.
    ///
    /// # Errors
    /// Any failure before the lobby is running: loading our profile,
    /// finding a starter item, creating or joining the room.
    pub async fn start(
        self,
        events: mpsc::Receiver<HubEvent>,
    ) -> Result<RunningBot, LobbybotError> {
        let me = self.catalog.me().await?;
        info!(user = %me.id, username = %me.username, "profile loaded");

        let search = ItemSearch::new(
            Arc::clone(&self.catalog),
            self.config.probes,
            self.config.search_timeout,
        );
        let starter = match search
            .run(self.config.search_criteria(), SearchMode::Unconditional)
            .await
        {
            SearchOutcome::Found(beatmap) => beatmap,
            SearchOutcome::NotNeeded | SearchOutcome::TimedOut => {
                error!("no starter item found");
                return Err(LobbybotError::NoStarterItem(self.config.search_timeout));
            }
        };
        info!(beatmap = %starter.id, stars = starter.difficulty_rating, "starter item found");

        let checksum = starter.checksum.clone();
        let request = NewRoom {
            name: self.room.name.clone(),
            password: self.room.password.clone(),
            queue_mode: QUEUE_MODE.to_string(),
            auto_skip: true,
            playlist: vec![NewPlaylistItem {
                beatmap_id: starter.id,
                beatmap_checksum: starter.checksum,
                ruleset_id: self.config.ruleset_id,
                required_mods: Vec::new(),
                allowed_mods: mods::legal_allowed_mods(&[]),
            }],
        };
        let room = self.catalog.create_room(&request).await?;
        info!(room = %room.id, channel = %room.channel_id, name = %request.name, "room created");
        if room.playlist.is_empty() {
            warn!(room = %room.id, "room came back without a playlist");
        }
        let playlist = room
            .playlist
            .iter()
            .cloned()
            .map(|mut item| {
                if item.beatmap_checksum.is_empty() && item.beatmap_id == starter.id {
                    item.beatmap_checksum = checksum.clone();
                }
                item
            })
            .collect();

        self.hub
            .invoke(HubCommand::JoinRoomWithPassword {
                room_id: room.id,
                password: self.room.password.clone(),
            })
            .await?;
        info!(room = %room.id, "room joined");

        let services = Services::new(
            self.hub,
            Arc::clone(&self.catalog),
            Arc::clone(&self.chat),
            room.channel_id,
        );
        let names = services.names.clone();
        let (handle, lobby) = spawn_lobby(self.config, &me, services, playlist, events);

        let poller = ChatPoller::new(self.chat, room.channel_id, me.id, names, handle.clone());
        let chat = tokio::spawn(poller.run());

        Ok(RunningBot {
            me,
            room,
            handle,
            lobby,
            chat,
        })
    }
}

/// A bot whose lobby and chat poller are running.
pub struct RunningBot {
    me: User,
    room: Room,
    handle: LobbyHandle,
    lobby: JoinHandle<()>,
    chat: JoinHandle<()>,
}

impl RunningBot {
    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn handle(&self) -> &LobbyHandle {
        &self.handle
    }

    /// Waits for the lobby to stop, then stops chat polling.
    pub async fn wait(self) {
        if let Err(e) = self.lobby.await {
            error!(error = %e, "lobby task panicked");
        }
        self.chat.abort();
        info!(room = %self.room.id, "bot stopped");
    }

    /// Asks the lobby to stop and waits for it.
    pub async fn shutdown(self) {
        if self.handle.shutdown().await.is_err() {
            info!("lobby already stopped");
        }
        self.wait().await;
    }
}
