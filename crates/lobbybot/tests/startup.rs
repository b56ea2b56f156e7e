//! Integration tests for the startup sequence and chat polling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lobbybot::{LobbybotError, RoomBot, RoomSettings, QUEUE_MODE};
use lobbybot_protocol::{
    Beatmap, BeatmapId, BeatmapStatus, ChannelId, ChatMessage, HubCommand, HubEvent, NewRoom,
    PlaylistItem, PlaylistItemId, Room, RoomId, User, UserId,
};
use lobbybot_room::{mods, LobbyConfig};
use lobbybot_transport::{ApiError, Catalog, Chat, Hub, HubError};
use tokio::sync::mpsc;

const ME: UserId = UserId(1);
const STARTER_ITEM: u64 = 40;

// =========================================================================
// Mocks
// =========================================================================

#[derive(Default)]
struct MockHub {
    commands: Mutex<Vec<HubCommand>>,
}

impl Hub for MockHub {
    async fn invoke(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

struct MockCatalog {
    /// Star rating of every beatmap.
    stars: f64,
    profile: bool,
    rooms: Mutex<Vec<NewRoom>>,
}

impl MockCatalog {
    fn new(stars: f64) -> Self {
        Self {
            stars,
            profile: true,
            rooms: Mutex::new(Vec::new()),
        }
    }
}

impl Catalog for MockCatalog {
    async fn lookup_beatmap(&self, id: BeatmapId) -> Result<Beatmap, ApiError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Beatmap {
            id,
            checksum: format!("sum-{}", id.0),
            status: BeatmapStatus::Ranked,
            mode: "osu".into(),
            difficulty_rating: self.stars,
            total_length: 100,
        })
    }

    async fn beatmap_attributes(&self, _id: BeatmapId, _ruleset: &str) -> Result<f64, ApiError> {
        Ok(self.stars)
    }

    async fn lookup_user(&self, id: UserId) -> Result<User, ApiError> {
        Ok(User {
            id,
            username: format!("player{}", id.0),
        })
    }

    async fn me(&self) -> Result<User, ApiError> {
        if !self.profile {
            return Err(ApiError::Remote("invalid token".into()));
        }
        Ok(User {
            id: ME,
            username: "lobbybot".into(),
        })
    }

    /// Echoes the requested playlist back the way the server does: with
    /// item ids assigned and without the checksum.
    async fn create_room(&self, room: &NewRoom) -> Result<Room, ApiError> {
        self.rooms.lock().unwrap().push(room.clone());
        let playlist = room
            .playlist
            .iter()
            .zip(STARTER_ITEM..)
            .map(|(item, id)| PlaylistItem {
                id: PlaylistItemId(id),
                owner_id: ME,
                beatmap_id: item.beatmap_id,
                beatmap_checksum: String::new(),
                ruleset_id: item.ruleset_id,
                required_mods: item.required_mods.clone(),
                allowed_mods: item.allowed_mods.clone(),
                playlist_order: 0,
                played_at: None,
                star_rating: self.stars,
            })
            .collect();
        Ok(Room {
            id: RoomId(300),
            channel_id: ChannelId(400),
            playlist,
        })
    }
}

/// Serves scripted incoming messages and records outgoing ones.
#[derive(Default)]
struct MockChat {
    inbox: Mutex<Vec<ChatMessage>>,
    sent: Mutex<Vec<String>>,
}

impl MockChat {
    fn post(&self, message_id: u64, sender: UserId, content: &str) {
        self.inbox.lock().unwrap().push(ChatMessage {
            message_id,
            sender_id: sender,
            content: content.into(),
        });
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Chat for MockChat {
    async fn send_message(
        &self,
        _channel: ChannelId,
        text: &str,
        _is_action: bool,
    ) -> Result<(), ApiError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn poll_messages(
        &self,
        _channel: ChannelId,
        since: u64,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(self
            .inbox
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.message_id > since)
            .cloned()
            .collect())
    }
}

fn room() -> RoomSettings {
    RoomSettings {
        name: "test room".into(),
        password: "pw".into(),
    }
}

struct Parts {
    hub: Arc<MockHub>,
    catalog: Arc<MockCatalog>,
    chat: Arc<MockChat>,
}

fn build(catalog: MockCatalog) -> (RoomBot<MockHub, MockCatalog, MockChat>, Parts) {
    let parts = Parts {
        hub: Arc::new(MockHub::default()),
        catalog: Arc::new(catalog),
        chat: Arc::new(MockChat::default()),
    };
    let bot = RoomBot::new(
        LobbyConfig::default(),
        room(),
        Arc::clone(&parts.hub),
        Arc::clone(&parts.catalog),
        Arc::clone(&parts.chat),
    );
    (bot, parts)
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_startup_creates_and_joins_room() {
    let (bot, parts) = build(MockCatalog::new(5.0));
    let (_events, rx) = mpsc::channel::<HubEvent>(16);

    let running = bot.start(rx).await.unwrap();

    assert_eq!(running.me().id, ME);
    assert_eq!(running.room().id, RoomId(300));

    let rooms = parts.catalog.rooms.lock().unwrap().clone();
    assert_eq!(rooms.len(), 1);
    let created = &rooms[0];
    assert_eq!(created.name, "test room");
    assert_eq!(created.password, "pw");
    assert_eq!(created.queue_mode, QUEUE_MODE);
    assert!(created.auto_skip);
    assert_eq!(created.playlist.len(), 1);
    assert_eq!(created.playlist[0].allowed_mods, mods::legal_allowed_mods(&[]));
    assert!(created.playlist[0].required_mods.is_empty());

    assert_eq!(
        parts.hub.commands.lock().unwrap().clone(),
        vec![HubCommand::JoinRoomWithPassword {
            room_id: RoomId(300),
            password: "pw".into(),
        }]
    );

    let status = running.handle().status().await.unwrap();
    assert!(status.active);
    assert_eq!(status.pending_items, 1);
    assert_eq!(status.current_item, Some(PlaylistItemId(STARTER_ITEM)));
    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_skip_vote_replaces_starter_item() {
    let (bot, parts) = build(MockCatalog::new(5.0));
    let (events, rx) = mpsc::channel::<HubEvent>(16);
    let running = bot.start(rx).await.unwrap();

    events
        .send(HubEvent::UserJoined { user_id: UserId(2) })
        .await
        .unwrap();
    parts.chat.post(1, UserId(2), "!skip");
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(parts
        .chat
        .sent()
        .contains(&"Skip vote passed, skipping the current map.".to_string()));
    let commands = parts.hub.commands.lock().unwrap().clone();
    assert_eq!(commands.len(), 3, "{commands:?}");
    assert!(matches!(commands[0], HubCommand::JoinRoomWithPassword { .. }));
    assert!(matches!(commands[1], HubCommand::AddPlaylistItem { .. }));
    assert_eq!(
        commands[2],
        HubCommand::RemovePlaylistItem {
            item_id: PlaylistItemId(STARTER_ITEM)
        }
    );

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_fails_without_starter_item() {
    // Every beatmap is far outside the default range.
    let (bot, parts) = build(MockCatalog::new(11.0));
    let (_events, rx) = mpsc::channel::<HubEvent>(16);

    let result = bot.start(rx).await;

    assert!(matches!(result, Err(LobbybotError::NoStarterItem(_))));
    assert!(parts.catalog.rooms.lock().unwrap().is_empty());
    assert!(parts.hub.commands.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_startup_fails_without_profile() {
    let mut catalog = MockCatalog::new(5.0);
    catalog.profile = false;
    let (bot, parts) = build(catalog);
    let (_events, rx) = mpsc::channel::<HubEvent>(16);

    let result = bot.start(rx).await;

    assert!(matches!(result, Err(LobbybotError::Api(_))));
    assert!(parts.catalog.rooms.lock().unwrap().is_empty());
}

// =========================================================================
// Chat polling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_polled_commands_reach_lobby_once() {
    let (bot, parts) = build(MockCatalog::new(5.0));
    let (_events, rx) = mpsc::channel::<HubEvent>(16);
    let running = bot.start(rx).await.unwrap();

    parts.chat.post(1, ME, "!help");
    parts.chat.post(2, UserId(2), "hello everyone");
    parts.chat.post(3, UserId(2), "!help");

    // Several poll intervals pass; message 3 must be handled exactly once.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let replies = parts
        .chat
        .sent()
        .into_iter()
        .filter(|m| m.starts_with("Available commands:"))
        .count();
    assert_eq!(replies, 1);

    running.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lobby_stops_when_hub_stream_ends() {
    let (bot, _parts) = build(MockCatalog::new(5.0));
    let (events, rx) = mpsc::channel::<HubEvent>(16);
    let running = bot.start(rx).await.unwrap();

    drop(events);
    tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .expect("bot should stop once the hub is gone");
}
