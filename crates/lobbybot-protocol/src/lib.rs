//! Wire types for lobbybot.
//!
//! This crate defines everything that crosses a process boundary:
//!
//! - **Identity** ([`UserId`], [`PlaylistItemId`], [`BeatmapId`], ...) —
//!   newtypes so ids of different kinds can't be mixed up.
//! - **Hub traffic** ([`HubEvent`], [`HubCommand`], [`Frame`]) — what the
//!   real-time multiplayer channel pushes to us and what we invoke on it.
//! - **Catalog payloads** ([`Beatmap`], [`User`], [`ChatMessage`],
//!   [`NewRoom`]) — the shapes returned by the REST collaborator.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes / HTTP) → Protocol (HubEvent, Beatmap) → Lobby / Room
//! ```
//!
//! Nothing in here knows about players being ready or votes being cast.
//! It only knows how the outside world names things.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Beatmap, BeatmapId, BeatmapStatus, ChannelId, ChatMessage, Frame, HubCommand,
    HubEvent, Mod, ModSettings, NewPlaylistItem, NewRoom, PlaylistItem,
    PlaylistItemId, RawUserState, Room, RoomId, RoomStatus, User, UserId,
};
