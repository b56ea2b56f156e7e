//! Display-name cache.
//!
//! Names are looked up from the catalog the first time a user id is seen
//! and kept for the life of the process. Concurrent lookups of the same id
//! share one request: each id owns a `OnceCell` that the first caller
//! fills and everyone else awaits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lobbybot_protocol::UserId;
use lobbybot_transport::{ApiError, Catalog};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<str>>>;

/// Resolves user ids to display names, caching forever.
///
/// Cheap to clone; clones share the cache.
pub struct NameCache<C> {
    catalog: Arc<C>,
    slots: Arc<Mutex<HashMap<UserId, Slot>>>,
}

impl<C> Clone for NameCache<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<C: Catalog> NameCache<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self {
            catalog,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the display name of `user`, asking the catalog on a miss.
    ///
    /// A failed lookup leaves the slot empty so the next call retries.
    ///
    /// # Errors
    /// Whatever [`Catalog::lookup_user`] returned.
    pub async fn resolve(&self, user: UserId) -> Result<Arc<str>, ApiError> {
        let slot = self.slot(user);
        let name = slot
            .get_or_try_init(|| async {
                let profile = self.catalog.lookup_user(user).await?;
                tracing::debug!(%user, username = %profile.username, "resolved display name");
                Ok::<_, ApiError>(Arc::from(profile.username))
            })
            .await?;
        Ok(Arc::clone(name))
    }

    /// Seeds the cache, e.g. with our own name from the startup lookup.
    pub fn insert(&self, user: UserId, name: &str) {
        let slot = self.slot(user);
        let _ = slot.set(Arc::from(name));
    }

    /// The cached name, without going to the catalog.
    pub fn cached(&self, user: UserId) -> Option<Arc<str>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&user).and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, user: UserId) -> Slot {
        // Poisoning can only come from a panic while holding this short
        // lock; the map itself is still consistent.
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(user).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use lobbybot_protocol::{Beatmap, BeatmapId, NewRoom, Room, User};

    use super::*;

    /// Answers user lookups with `player<id>` and counts calls.
    #[derive(Default)]
    struct CountingCatalog {
        lookups: AtomicU32,
        fail: bool,
    }

    impl Catalog for CountingCatalog {
        async fn lookup_beatmap(&self, _id: BeatmapId) -> Result<Beatmap, ApiError> {
            Err(ApiError::Remote("not used".into()))
        }

        async fn beatmap_attributes(&self, _id: BeatmapId, _ruleset: &str) -> Result<f64, ApiError> {
            Err(ApiError::Remote("not used".into()))
        }

        async fn lookup_user(&self, id: UserId) -> Result<User, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(ApiError::Transport("down".into()));
            }
            Ok(User {
                id,
                username: format!("player{}", id.0),
            })
        }

        async fn me(&self) -> Result<User, ApiError> {
            Err(ApiError::Remote("not used".into()))
        }

        async fn create_room(&self, _room: &NewRoom) -> Result<Room, ApiError> {
            Err(ApiError::Remote("not used".into()))
        }
    }

    #[tokio::test]
    async fn test_resolve_caches() {
        let catalog = Arc::new(CountingCatalog::default());
        let names = NameCache::new(Arc::clone(&catalog));

        assert_eq!(&*names.resolve(UserId(7)).await.unwrap(), "player7");
        assert_eq!(&*names.resolve(UserId(7)).await.unwrap(), "player7");
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(names.cached(UserId(7)).as_deref(), Some("player7"));
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_lookup() {
        let catalog = Arc::new(CountingCatalog::default());
        let names = NameCache::new(Arc::clone(&catalog));

        let (a, b) = tokio::join!(names.resolve(UserId(3)), names.resolve(UserId(3)));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let catalog = Arc::new(CountingCatalog {
            fail: true,
            ..Default::default()
        });
        let names = NameCache::new(Arc::clone(&catalog));

        assert!(names.resolve(UserId(1)).await.is_err());
        assert!(names.resolve(UserId(1)).await.is_err());
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 2);
        assert!(names.cached(UserId(1)).is_none());
    }

    #[tokio::test]
    async fn test_seeded_name_skips_catalog() {
        let catalog = Arc::new(CountingCatalog::default());
        let names = NameCache::new(Arc::clone(&catalog));
        names.insert(UserId(42), "lobbybot");

        assert_eq!(&*names.resolve(UserId(42)).await.unwrap(), "lobbybot");
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
    }
}
