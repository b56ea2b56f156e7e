//! Core protocol types for lobbybot.
//!
//! Two collaborators talk to us: the real-time multiplayer hub (events in,
//! commands out) and the REST catalog (beatmaps, users, chat, rooms). Every
//! structure that crosses either boundary lives here.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user (player or the bot itself).
///
/// Newtype wrapper around `u64`: you can't pass a `BeatmapId` where a
/// `UserId` is expected, even though both are numbers on the wire.
/// `#[serde(transparent)]` keeps the JSON a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Identifier of one entry in the room's play queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistItemId(pub u64);

impl fmt::Display for PlaylistItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// Identifier of a beatmap in the external catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatmapId(pub u64);

impl fmt::Display for BeatmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

/// Identifier of the multiplayer room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifier of the chat channel attached to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Raw state codes
// ---------------------------------------------------------------------------

/// A user state code exactly as the hub reports it.
///
/// Only three codes matter for lobby bookkeeping; everything else
/// (loading, playing, results...) is "in game" and ignored. The semantic
/// mapping lives in the lobby crate; the protocol only names the codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUserState(pub u8);

impl RawUserState {
    /// In the room, not ready.
    pub const IDLE: Self = Self(0);
    /// Signalled readiness for the next match.
    pub const READY: Self = Self(1);
    /// Watching instead of playing.
    pub const SPECTATING: Self = Self(8);
}

/// Room-level state as reported by `RoomStateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Waiting in the lobby.
    Open,
    /// A match has just started (code 1).
    MatchStarted,
    /// The current match finished (code 2).
    MatchFinished,
    /// Any code we don't act on.
    Other(u8),
}

impl RoomStatus {
    /// Maps a raw room state code onto the states the coordinator acts on.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Open,
            1 => Self::MatchStarted,
            2 => Self::MatchFinished,
            other => Self::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Modifiers and playlist items
// ---------------------------------------------------------------------------

/// Settings attached to a modifier. Only the speed multiplier affects
/// difficulty; everything else is carried but ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModSettings {
    /// Custom playback rate for speed-changing modifiers (e.g. 1.35 for a
    /// slowed-down double time).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_change: Option<f64>,
}

impl ModSettings {
    /// `true` when no setting is present.
    pub fn is_empty(&self) -> bool {
        self.speed_change.is_none()
    }
}

/// A gameplay modifier: a two-letter acronym plus optional settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mod {
    /// Upper-case acronym, e.g. `"DT"`.
    pub acronym: String,

    /// Optional settings; omitted from JSON when empty.
    #[serde(default, skip_serializing_if = "ModSettings::is_empty")]
    pub settings: ModSettings,
}

impl Mod {
    /// A modifier with default settings.
    pub fn new(acronym: impl Into<String>) -> Self {
        Self {
            acronym: acronym.into(),
            settings: ModSettings::default(),
        }
    }

    /// A speed modifier with an explicit rate.
    pub fn with_speed(acronym: impl Into<String>, speed_change: f64) -> Self {
        Self {
            acronym: acronym.into(),
            settings: ModSettings {
                speed_change: Some(speed_change),
            },
        }
    }
}

/// One entry in the room's play queue, as the hub describes it.
///
/// The hub is the source of truth. The coordinator keeps a cache of these
/// and overwrites its copy on every add/change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Stable id assigned by the server.
    pub id: PlaylistItemId,
    /// Who queued it.
    pub owner_id: UserId,
    /// Which beatmap it plays.
    pub beatmap_id: BeatmapId,
    /// Content checksum of the beatmap file. Room responses may leave it out.
    #[serde(default)]
    pub beatmap_checksum: String,
    /// Game mode id (0 = standard).
    #[serde(default)]
    pub ruleset_id: u8,
    /// Modifiers every player must use.
    #[serde(default)]
    pub required_mods: Vec<Mod>,
    /// Modifiers players may pick freely.
    #[serde(default)]
    pub allowed_mods: Vec<Mod>,
    /// Ordering key; the lowest pending key plays next.
    #[serde(default)]
    pub playlist_order: u32,
    /// Set once the item has been played. `None` while pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_at: Option<String>,
    /// Base difficulty as reported by the hub (0 when unknown).
    #[serde(default)]
    pub star_rating: f64,
}

impl PlaylistItem {
    /// `true` once the server has marked the item as played.
    pub fn is_played(&self) -> bool {
        self.played_at.is_some()
    }
}

/// The payload of an `AddPlaylistItem` invocation: an item the server
/// hasn't assigned an id to yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlaylistItem {
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    #[serde(default)]
    pub ruleset_id: u8,
    #[serde(default)]
    pub required_mods: Vec<Mod>,
    #[serde(default)]
    pub allowed_mods: Vec<Mod>,
}

// ---------------------------------------------------------------------------
// Hub traffic
// ---------------------------------------------------------------------------

/// Events pushed by the real-time hub.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON:
/// `{ "type": "UserJoined", "user_id": 42 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubEvent {
    /// A user entered the room.
    UserJoined { user_id: UserId },

    /// A user left the room.
    UserLeft { user_id: UserId },

    /// A user was kicked. Handled exactly like [`HubEvent::UserLeft`].
    UserKicked { user_id: UserId },

    /// Room host moved to another user.
    HostChanged { user_id: UserId },

    /// A user's state code changed.
    UserStateChanged { user_id: UserId, state: RawUserState },

    /// The room's state code changed. See [`RoomStatus::from_code`].
    RoomStateChanged { state: u8 },

    /// A new item was queued.
    PlaylistItemAdded { item: PlaylistItem },

    /// An item left the queue.
    PlaylistItemRemoved { item_id: PlaylistItemId },

    /// An existing item was edited or marked played.
    PlaylistItemChanged { item: PlaylistItem },
}

/// Commands we invoke on the hub.
///
/// Adjacently tagged so the method name and its arguments stay separate:
/// `{ "method": "RemovePlaylistItem", "args": { "item_id": 7 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum HubCommand {
    /// Join a room we created.
    JoinRoomWithPassword { room_id: RoomId, password: String },

    /// Change our own user state ("prepare" before starting a match).
    ChangeState { state: RawUserState },

    /// Start the match with whoever is ready.
    StartMatch,

    /// Queue a new item.
    AddPlaylistItem { item: NewPlaylistItem },

    /// Remove an item from the queue.
    RemovePlaylistItem { item_id: PlaylistItemId },

    /// Overwrite an item in place.
    EditPlaylistItem { item: PlaylistItem },

    /// Hand the host role to another user.
    TransferHost { user_id: UserId },
}

impl HubCommand {
    /// The hub method name, used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::JoinRoomWithPassword { .. } => "JoinRoomWithPassword",
            Self::ChangeState { .. } => "ChangeState",
            Self::StartMatch => "StartMatch",
            Self::AddPlaylistItem { .. } => "AddPlaylistItem",
            Self::RemovePlaylistItem { .. } => "RemovePlaylistItem",
            Self::EditPlaylistItem { .. } => "EditPlaylistItem",
            Self::TransferHost { .. } => "TransferHost",
        }
    }
}

/// The top-level unit on the hub socket.
///
/// Invocations carry an id so the matching completion can be routed back
/// to the caller waiting on it. Events are unsolicited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Client → hub: run this command.
    Invocation { id: u64, command: HubCommand },

    /// Hub → client: the invocation with this id finished.
    /// `error` is `None` on success.
    Completion {
        id: u64,
        #[serde(default)]
        error: Option<String>,
    },

    /// Hub → client: something happened in the room.
    Event { event: HubEvent },
}

// ---------------------------------------------------------------------------
// Catalog payloads
// ---------------------------------------------------------------------------

/// Publication status of a beatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatmapStatus {
    Graveyard,
    Wip,
    Pending,
    Ranked,
    Approved,
    Qualified,
    Loved,
    /// Any status string we don't know.
    #[serde(other)]
    Unknown,
}

impl BeatmapStatus {
    /// Ranked, loved and approved maps have stable content and
    /// leaderboards; those are the only ones the search accepts.
    pub fn is_listed(self) -> bool {
        matches!(self, Self::Ranked | Self::Loved | Self::Approved)
    }
}

/// A beatmap as returned by the catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub id: BeatmapId,
    pub checksum: String,
    pub status: BeatmapStatus,
    /// Ruleset name, e.g. `"osu"`.
    pub mode: String,
    /// Base difficulty in stars.
    pub difficulty_rating: f64,
    /// Length in seconds.
    pub total_length: u32,
}

/// A user profile (only the fields we use).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// A message read from the room's chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: u64,
    pub sender_id: UserId,
    pub content: String,
}

/// A created room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub channel_id: ChannelId,
    /// The items the room was created with.
    #[serde(default)]
    pub playlist: Vec<PlaylistItem>,
}

/// Request body for creating a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub password: String,
    pub queue_mode: String,
    pub auto_skip: bool,
    pub playlist: Vec<NewPlaylistItem>,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The hub bridge and REST API expect exact JSON shapes; these tests pin
    //! down the serde attributes that produce them.

    use super::*;

    fn item() -> PlaylistItem {
        PlaylistItem {
            id: PlaylistItemId(3),
            owner_id: UserId(10),
            beatmap_id: BeatmapId(117379),
            beatmap_checksum: "abc".into(),
            ruleset_id: 0,
            required_mods: vec![Mod::new("HR")],
            allowed_mods: vec![],
            playlist_order: 1,
            played_at: None,
            star_rating: 4.2,
        }
    }

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
        assert_eq!(PlaylistItemId(7).to_string(), "I-7");
        assert_eq!(BeatmapId(7).to_string(), "B-7");
        assert_eq!(RoomId(7).to_string(), "R-7");
    }

    #[test]
    fn test_room_status_from_code() {
        assert_eq!(RoomStatus::from_code(0), RoomStatus::Open);
        assert_eq!(RoomStatus::from_code(1), RoomStatus::MatchStarted);
        assert_eq!(RoomStatus::from_code(2), RoomStatus::MatchFinished);
        assert_eq!(RoomStatus::from_code(9), RoomStatus::Other(9));
    }

    #[test]
    fn test_mod_without_settings_omits_field() {
        let json: serde_json::Value = serde_json::to_value(Mod::new("HD")).unwrap();
        assert_eq!(json["acronym"], "HD");
        assert!(json.get("settings").is_none());
    }

    #[test]
    fn test_mod_with_speed_settings_round_trips() {
        let json = r#"{"acronym":"DT","settings":{"speed_change":1.3}}"#;
        let m: Mod = serde_json::from_str(json).unwrap();
        assert_eq!(m.settings.speed_change, Some(1.3));
    }

    #[test]
    fn test_hub_event_internally_tagged() {
        let event = HubEvent::UserStateChanged {
            user_id: UserId(4),
            state: RawUserState::READY,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UserStateChanged");
        assert_eq!(json["user_id"], 4);
        assert_eq!(json["state"], 1);
    }

    #[test]
    fn test_playlist_item_defaults_missing_fields() {
        let json = r#"{
            "id": 1, "owner_id": 2, "beatmap_id": 3, "beatmap_checksum": "x"
        }"#;
        let item: PlaylistItem = serde_json::from_str(json).unwrap();
        assert!(item.required_mods.is_empty());
        assert!(!item.is_played());
        assert_eq!(item.playlist_order, 0);
    }

    #[test]
    fn test_hub_command_adjacently_tagged() {
        let cmd = HubCommand::RemovePlaylistItem {
            item_id: PlaylistItemId(7),
        };
        let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["method"], "RemovePlaylistItem");
        assert_eq!(json["args"]["item_id"], 7);
    }

    #[test]
    fn test_unit_command_has_no_args() {
        let json: serde_json::Value =
            serde_json::to_value(HubCommand::StartMatch).unwrap();
        assert_eq!(json["method"], "StartMatch");
        assert!(json.get("args").is_none());
    }

    #[test]
    fn test_edit_command_carries_whole_item() {
        let cmd = HubCommand::EditPlaylistItem { item: item() };
        let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["args"]["item"]["beatmap_id"], 117379);
        assert_eq!(json["args"]["item"]["required_mods"][0]["acronym"], "HR");
    }

    #[test]
    fn test_completion_frame_error_defaults_to_none() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"Completion","id":9}"#).unwrap();
        assert_eq!(frame, Frame::Completion { id: 9, error: None });
    }

    #[test]
    fn test_beatmap_status_lowercase_and_unknown() {
        let s: BeatmapStatus = serde_json::from_str("\"loved\"").unwrap();
        assert_eq!(s, BeatmapStatus::Loved);
        let s: BeatmapStatus = serde_json::from_str("\"something\"").unwrap();
        assert_eq!(s, BeatmapStatus::Unknown);
    }

    #[test]
    fn test_beatmap_status_is_listed() {
        assert!(BeatmapStatus::Ranked.is_listed());
        assert!(BeatmapStatus::Loved.is_listed());
        assert!(BeatmapStatus::Approved.is_listed());
        assert!(!BeatmapStatus::Qualified.is_listed());
        assert!(!BeatmapStatus::Graveyard.is_listed());
    }

    #[test]
    fn test_room_carries_created_playlist() {
        let room: Room = serde_json::from_str(
            r#"{"id":3,"channel_id":4,"playlist":[{"id":40,"owner_id":1,"beatmap_id":117379}]}"#,
        )
        .unwrap();
        assert_eq!(room.playlist.len(), 1);
        assert_eq!(room.playlist[0].id, PlaylistItemId(40));
        assert!(room.playlist[0].beatmap_checksum.is_empty());
        assert!(!room.playlist[0].is_played());

        let bare: Room = serde_json::from_str(r#"{"id":3,"channel_id":4}"#).unwrap();
        assert!(bare.playlist.is_empty());
    }

    #[test]
    fn test_hub_command_method_names() {
        assert_eq!(HubCommand::StartMatch.method(), "StartMatch");
        assert_eq!(
            HubCommand::TransferHost { user_id: UserId(1) }.method(),
            "TransferHost"
        );
    }
}
