//! Lobby bookkeeping for lobbybot.
//!
//! This crate knows who is in the room and what they want:
//!
//! 1. **Readiness** — [`PlayerTracker`] maps each tracked player to a
//!    [`ReadyState`] and derives a [`LobbySnapshot`] (ready/spectating
//!    counts) by folding over those states on demand.
//! 2. **Skip votes** — [`SkipVotes`] holds at most one vote per player.
//! 3. **Display names** — [`NameCache`] resolves a user id to a name once
//!    and keeps it for the life of the process.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room coordinator (above)  ← decides when to start, skip, replenish
//!     ↕
//! Lobby bookkeeping (this crate)  ← who is here, who is ready, who voted
//!     ↕
//! Protocol (below)  ← UserId, RawUserState
//! ```

mod names;
mod state;
mod tracker;
mod votes;

pub use names::NameCache;
pub use state::ReadyState;
pub use tracker::{half, LobbySnapshot, Observed, PlayerTracker};
pub use votes::SkipVotes;
