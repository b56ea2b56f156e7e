//! Skip votes for the current playlist item.

use std::collections::HashSet;

use lobbybot_protocol::UserId;

/// The set of players who want the current item skipped.
///
/// A set, not a counter: voting twice is a no-op. Cleared whenever a match
/// starts or a skip executes.
#[derive(Debug, Default)]
pub struct SkipVotes {
    voters: HashSet<UserId>,
}

impl SkipVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a vote. Returns `false` if `voter` had already voted.
    pub fn cast(&mut self, voter: UserId) -> bool {
        self.voters.insert(voter)
    }

    /// Withdraws a vote, e.g. when the voter leaves. Returns whether a
    /// vote was actually removed.
    pub fn retract(&mut self, voter: UserId) -> bool {
        self.voters.remove(&voter)
    }

    pub fn contains(&self, voter: UserId) -> bool {
        self.voters.contains(&voter)
    }

    pub fn count(&self) -> usize {
        self.voters.len()
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }
}
