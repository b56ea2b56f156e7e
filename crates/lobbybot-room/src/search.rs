//! Random item search.
//!
//! A search fans out into `probes` concurrent loops. Each loop picks a
//! random beatmap id, looks it up, and keeps going until it finds one the
//! criteria accept or the search is over. The first probe to succeed flips
//! the task's `resolved` flag with a compare-and-set and delivers its
//! beatmap; every other probe sees the flag on its next iteration and
//! stops. Lookups already in flight are left to finish and their results
//! are dropped: probes only read from the catalog, so a late result has
//! nothing to undo.
//!
//! ```text
//!             ┌─ probe 0: lookup → reject → lookup → accept ─┐  CAS wins
//! run() ──────┼─ probe 1: lookup → reject → lookup ── … ─────┼─ sees flag, exits
//!             └─ probe N: lookup → accept (too late) ────────┘  CAS loses, discarded
//! ```

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lobbybot_protocol::{Beatmap, BeatmapId};
use lobbybot_transport::Catalog;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace};

use crate::config::DifficultyRange;
use crate::playlist::PendingCount;

/// Pause after a failed lookup, in milliseconds. Jittered so probes don't
/// retry in step.
const LOOKUP_BACKOFF_MS: RangeInclusive<u64> = 250..=750;

/// What a candidate beatmap must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub range: DifficultyRange,
    /// Seconds.
    pub max_length: u32,
    pub ruleset: String,
    /// Ids are drawn uniformly from `0..id_space`.
    pub id_space: u64,
}

impl SearchCriteria {
    /// Listed status, matching ruleset, difficulty in range, short enough.
    pub fn accepts(&self, beatmap: &Beatmap) -> bool {
        beatmap.status.is_listed()
            && beatmap.mode == self.ruleset
            && self.range.contains(beatmap.difficulty_rating)
            && beatmap.total_length <= self.max_length
    }
}

/// When a search bothers to run.
#[derive(Debug, Clone)]
pub enum SearchMode {
    /// Give up as soon as the playlist has a pending item.
    OnlyIfNeeded(PendingCount),
    Unconditional,
}

impl SearchMode {
    fn satisfied(&self) -> bool {
        match self {
            Self::OnlyIfNeeded(pending) => pending.get() > 0,
            Self::Unconditional => false,
        }
    }
}

/// How a search ended. Exactly one per search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Beatmap),
    /// "Only if needed" and the playlist filled up on its own.
    NotNeeded,
    TimedOut,
}

/// State shared by the probes of one search.
struct SearchTask {
    resolved: AtomicBool,
    deadline: Instant,
    criteria: SearchCriteria,
    mode: SearchMode,
    outcome: mpsc::Sender<SearchOutcome>,
}

impl SearchTask {
    /// Claims the one resolution. Only the caller that gets `true` may
    /// report an outcome.
    fn try_resolve(&self) -> bool {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn resolve_with(&self, outcome: SearchOutcome) -> bool {
        if !self.try_resolve() {
            return false;
        }
        // Capacity 1 and a single resolver: never full.
        let _ = self.outcome.try_send(outcome);
        true
    }
}

/// Runs random item searches against a [`Catalog`].
///
/// Cheap to clone; clones share the catalog.
pub struct ItemSearch<C> {
    catalog: Arc<C>,
    probes: usize,
    timeout: Duration,
}

impl<C> Clone for ItemSearch<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            probes: self.probes,
            timeout: self.timeout,
        }
    }
}

impl<C: Catalog> ItemSearch<C> {
    pub fn new(catalog: Arc<C>, probes: usize, timeout: Duration) -> Self {
        Self {
            catalog,
            probes: probes.max(1),
            timeout,
        }
    }

    /// Searches for one beatmap `criteria` accepts.
    ///
    /// Resolves exactly once: with the first accepted beatmap, with
    /// [`SearchOutcome::NotNeeded`] if `mode` stops caring, or with
    /// [`SearchOutcome::TimedOut`] once the timeout elapses.
    pub async fn run(&self, criteria: SearchCriteria, mode: SearchMode) -> SearchOutcome {
        if mode.satisfied() {
            debug!("playlist has items, search not needed");
            return SearchOutcome::NotNeeded;
        }

        let deadline = Instant::now() + self.timeout;
        let (tx, mut rx) = mpsc::channel(1);
        let task = Arc::new(SearchTask {
            resolved: AtomicBool::new(false),
            deadline,
            criteria,
            mode,
            outcome: tx,
        });

        info!(probes = self.probes, timeout_secs = self.timeout.as_secs(), "searching for a random item");
        for probe_id in 0..self.probes {
            tokio::spawn(probe(probe_id, Arc::clone(&self.catalog), Arc::clone(&task)));
        }

        match time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(outcome)) => outcome,
            // We hold `task` and with it a sender, so the channel can't close.
            Ok(None) => SearchOutcome::TimedOut,
            Err(_) => {
                if task.resolve_with(SearchOutcome::TimedOut) {
                    info!("search timed out");
                }
                // Either our TimedOut or a probe that won at the last moment.
                rx.recv().await.unwrap_or(SearchOutcome::TimedOut)
            }
        }
    }
}

/// One probe loop. Checks the flag and deadline before every attempt.
async fn probe<C: Catalog>(probe_id: usize, catalog: Arc<C>, task: Arc<SearchTask>) {
    let mut attempts: u32 = 0;

    loop {
        if task.is_resolved() || Instant::now() >= task.deadline {
            trace!(probe_id, attempts, "probe stopping");
            return;
        }
        if task.mode.satisfied() {
            if task.resolve_with(SearchOutcome::NotNeeded) {
                debug!(probe_id, "playlist filled during search");
            }
            return;
        }

        let id = BeatmapId(rand::rng().random_range(0..task.criteria.id_space.max(1)));
        attempts += 1;

        match catalog.lookup_beatmap(id).await {
            Ok(beatmap) if task.criteria.accepts(&beatmap) => {
                let beatmap_id = beatmap.id;
                if task.resolve_with(SearchOutcome::Found(beatmap)) {
                    info!(probe_id, beatmap = %beatmap_id, attempts, "found a random item");
                } else {
                    trace!(probe_id, beatmap = %beatmap_id, "discarding late probe result");
                }
                return;
            }
            Ok(beatmap) => {
                trace!(probe_id, beatmap = %beatmap.id, status = ?beatmap.status, "candidate rejected");
            }
            Err(e) => {
                trace!(probe_id, %id, error = %e, "lookup failed, backing off");
                let backoff = Duration::from_millis(rand::rng().random_range(LOOKUP_BACKOFF_MS));
                time::sleep_until((Instant::now() + backoff).min(task.deadline)).await;
                continue;
            }
        }

        tokio::task::yield_now().await;
    }
}
