//! Semantic readiness states.

use std::fmt;

use lobbybot_protocol::RawUserState;

/// Where a player stands as far as starting the next match is concerned.
///
/// The hub reports many more user states (loading, playing, results...).
/// Only the three lobby states matter for bookkeeping; everything else is
/// "in game" and ignored. `Absent` has no raw code: it's what leaving or
/// being kicked looks like to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Idle,
    Ready,
    Spectating,
    Absent,
}

impl ReadyState {
    /// Maps a raw hub state code to a lobby state.
    ///
    /// Returns `None` for in-game codes, which the tracker must ignore.
    ///
    /// ```
    /// use lobbybot_lobby::ReadyState;
    /// use lobbybot_protocol::RawUserState;
    ///
    /// assert_eq!(ReadyState::from_raw(RawUserState::READY), Some(ReadyState::Ready));
    /// assert_eq!(ReadyState::from_raw(RawUserState(3)), None);
    /// ```
    pub fn from_raw(raw: RawUserState) -> Option<Self> {
        match raw {
            RawUserState::IDLE => Some(Self::Idle),
            RawUserState::READY => Some(Self::Ready),
            RawUserState::SPECTATING => Some(Self::Spectating),
            _ => None,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Spectating => "spectating",
            Self::Absent => "absent",
        };
        f.write_str(name)
    }
}
