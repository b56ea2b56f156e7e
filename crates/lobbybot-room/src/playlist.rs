//! Local cache of the room's play queue.
//!
//! The hub is the source of truth; every add/change/remove event
//! overwrites our copy. Played items are purged as soon as we see them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lobbybot_protocol::{PlaylistItem, PlaylistItemId};

/// Shared read-only view of how many items are still pending.
///
/// The search engine reads it to decide whether an "only if needed" search
/// is still needed; only the [`PlaylistIndex`] writes it.
#[derive(Debug, Clone, Default)]
pub struct PendingCount(Arc<AtomicUsize>);

impl PendingCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, n: usize) {
        self.0.store(n, Ordering::Release);
    }
}

/// Pending playlist items keyed by id.
#[derive(Debug, Default)]
pub struct PlaylistIndex {
    items: HashMap<PlaylistItemId, PlaylistItem>,
    pending: PendingCount,
}

impl PlaylistIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item`, or purges it if it has been played.
    ///
    /// Returns `true` if the item is pending after the call.
    pub fn upsert(&mut self, item: PlaylistItem) -> bool {
        let pending = if item.is_played() {
            if self.items.remove(&item.id).is_some() {
                tracing::debug!(item = %item.id, "purged played item");
            }
            false
        } else {
            self.items.insert(item.id, item);
            true
        };
        self.sync();
        pending
    }

    pub fn remove(&mut self, id: PlaylistItemId) -> Option<PlaylistItem> {
        let removed = self.items.remove(&id);
        self.sync();
        removed
    }

    /// The item that plays next: lowest ordering key, ties broken by id.
    pub fn current(&self) -> Option<&PlaylistItem> {
        self.items
            .values()
            .min_by_key(|item| (item.playlist_order, item.id))
    }

    pub fn get(&self, id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.items.get(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.items.len()
    }

    /// A handle that follows [`pending_count`](Self::pending_count).
    pub fn pending_handle(&self) -> PendingCount {
        self.pending.clone()
    }

    fn sync(&self) {
        self.pending.set(self.items.len());
    }
}
