//! The player tracker: who is in the room and how ready they are.
//!
//! Events arrive from the hub one at a time, in order, on the room actor.
//! The tracker is a plain `HashMap` owned by that actor, so it needs no
//! locking of its own.
//!
//! # Counts are folds
//!
//! The ready/spectating counts are never stored. [`PlayerTracker::snapshot`]
//! walks the player map every time it's asked. Rooms hold a handful of
//! players, so the walk is trivially cheap, and a count that is recomputed
//! can't drift away from the states it summarises.

use std::collections::HashMap;

use lobbybot_protocol::UserId;

use crate::ReadyState;

/// What [`PlayerTracker::observe`] did with a state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    /// First sighting; the player is now tracked.
    Inserted,
    /// A known player's state changed (or was re-reported unchanged).
    Updated { from: ReadyState },
    /// A known player left and is no longer tracked.
    Removed { from: ReadyState },
    /// `Absent` for a player we never tracked. Nothing changed.
    Ignored,
}

impl Observed {
    /// Whether the tracked set or any state actually changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Derived counts over the tracked players. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbySnapshot {
    /// Tracked players, excluding anyone who has left.
    pub players: usize,
    pub ready: usize,
    pub spectating: usize,
}

impl LobbySnapshot {
    /// Players who would have to be ready for everyone to be ready.
    pub fn need_for_start(&self) -> usize {
        self.players.saturating_sub(self.spectating)
    }

    /// The majority threshold over [`need_for_start`](Self::need_for_start).
    pub fn need_half(&self) -> usize {
        half(self.need_for_start())
    }

    /// Whether every non-spectator is ready (and there is at least one).
    pub fn all_ready(&self) -> bool {
        let need = self.need_for_start();
        need >= 1 && self.ready == need
    }
}

/// Half of `n`, rounding up: 4 → 2, 5 → 3, 1 → 1, 0 → 0.
///
/// The single quorum rule shared by auto-start and skip votes.
pub fn half(n: usize) -> usize {
    n.div_ceil(2)
}

/// Tracks every player in the room and their [`ReadyState`].
///
/// Players never appear in the map as `Absent`: that state removes them.
#[derive(Debug, Default)]
pub struct PlayerTracker {
    players: HashMap<UserId, ReadyState>,
}

impl PlayerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a state report for `user`.
    ///
    /// - Unseen player, state not `Absent` → insert with that state.
    /// - Unseen player, `Absent` → nothing to do.
    /// - Known player, `Absent` → remove.
    /// - Known player, anything else → overwrite.
    ///
    /// Re-reporting the same state is harmless: the fold gives the same
    /// counts either way.
    pub fn observe(&mut self, user: UserId, state: ReadyState) -> Observed {
        let observed = match (self.players.get(&user).copied(), state) {
            (None, ReadyState::Absent) => Observed::Ignored,
            (None, state) => {
                self.players.insert(user, state);
                Observed::Inserted
            }
            (Some(from), ReadyState::Absent) => {
                self.players.remove(&user);
                Observed::Removed { from }
            }
            (Some(from), state) => {
                self.players.insert(user, state);
                Observed::Updated { from }
            }
        };

        tracing::debug!(%user, %state, ?observed, "player state observed");
        observed
    }

    /// Counts ready and spectating players right now.
    pub fn snapshot(&self) -> LobbySnapshot {
        self.players.values().fold(
            LobbySnapshot {
                players: self.players.len(),
                ..LobbySnapshot::default()
            },
            |mut acc, state| {
                match state {
                    ReadyState::Ready => acc.ready += 1,
                    ReadyState::Spectating => acc.spectating += 1,
                    ReadyState::Idle | ReadyState::Absent => {}
                }
                acc
            },
        )
    }

    /// Moves every `Ready` player back to `Idle`.
    ///
    /// The hub does the same on its side when a match starts or the item
    /// is swapped; this keeps our copy in step without waiting for the
    /// per-player echoes. Returns how many players were reset.
    pub fn reset_ready(&mut self) -> usize {
        let mut reset = 0;
        for state in self.players.values_mut() {
            if *state == ReadyState::Ready {
                *state = ReadyState::Idle;
                reset += 1;
            }
        }
        reset
    }

    #[cfg(test)]
    fn state_of(&self, user: UserId) -> Option<ReadyState> {
        self.players.get(&user).copied()
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.players.contains_key(&user)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Tracked player ids, in no particular order.
    pub fn players(&self) -> impl Iterator<Item = UserId> + '_ {
        self.players.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(states: &[(u64, ReadyState)]) -> PlayerTracker {
        let mut tracker = PlayerTracker::new();
        for &(id, state) in states {
            tracker.observe(UserId(id), state);
        }
        tracker
    }

    #[test]
    fn test_first_sight_inserts() {
        let mut tracker = PlayerTracker::new();
        let observed = tracker.observe(UserId(1), ReadyState::Idle);

        assert_eq!(observed, Observed::Inserted);
        assert_eq!(tracker.state_of(UserId(1)), Some(ReadyState::Idle));
        assert_eq!(tracker.snapshot().players, 1);
    }

    #[test]
    fn test_absent_for_unknown_player_ignored() {
        let mut tracker = PlayerTracker::new();
        let observed = tracker.observe(UserId(1), ReadyState::Absent);

        assert_eq!(observed, Observed::Ignored);
        assert!(!observed.changed());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_absent_removes_known_player() {
        let mut tracker = tracker_with(&[(1, ReadyState::Ready)]);
        let observed = tracker.observe(UserId(1), ReadyState::Absent);

        assert_eq!(
            observed,
            Observed::Removed {
                from: ReadyState::Ready
            }
        );
        assert!(!tracker.contains(UserId(1)));
        assert_eq!(tracker.snapshot(), LobbySnapshot::default());
    }

    #[test]
    fn test_counts_follow_transitions() {
        let mut tracker = tracker_with(&[
            (1, ReadyState::Idle),
            (2, ReadyState::Idle),
            (3, ReadyState::Idle),
        ]);
        tracker.observe(UserId(1), ReadyState::Ready);
        tracker.observe(UserId(2), ReadyState::Spectating);

        let snap = tracker.snapshot();
        assert_eq!(snap.players, 3);
        assert_eq!(snap.ready, 1);
        assert_eq!(snap.spectating, 1);
        assert_eq!(snap.need_for_start(), 2);

        tracker.observe(UserId(1), ReadyState::Idle);
        assert_eq!(tracker.snapshot().ready, 0);
    }

    #[test]
    fn test_repeated_report_does_not_double_count() {
        let mut tracker = tracker_with(&[(1, ReadyState::Idle)]);
        tracker.observe(UserId(1), ReadyState::Ready);
        tracker.observe(UserId(1), ReadyState::Ready);
        tracker.observe(UserId(1), ReadyState::Ready);

        assert_eq!(tracker.snapshot().ready, 1);
    }

    #[test]
    fn test_reset_ready_only_touches_ready() {
        let mut tracker = tracker_with(&[
            (1, ReadyState::Ready),
            (2, ReadyState::Ready),
            (3, ReadyState::Spectating),
            (4, ReadyState::Idle),
        ]);

        assert_eq!(tracker.reset_ready(), 2);
        let snap = tracker.snapshot();
        assert_eq!(snap.ready, 0);
        assert_eq!(snap.spectating, 1);
        assert_eq!(tracker.state_of(UserId(1)), Some(ReadyState::Idle));
    }

    #[test]
    fn test_half_rounds_up() {
        assert_eq!(half(0), 0);
        assert_eq!(half(1), 1);
        assert_eq!(half(2), 1);
        assert_eq!(half(4), 2);
        assert_eq!(half(5), 3);
    }

    #[test]
    fn test_all_ready_needs_someone() {
        assert!(!LobbySnapshot::default().all_ready());

        let only_spectators = LobbySnapshot {
            players: 2,
            ready: 0,
            spectating: 2,
        };
        assert!(!only_spectators.all_ready());

        let all = LobbySnapshot {
            players: 3,
            ready: 2,
            spectating: 1,
        };
        assert!(all.all_ready());
    }
}
