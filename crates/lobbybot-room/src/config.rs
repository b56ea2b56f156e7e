//! Lobby configuration.

use std::fmt;
use std::time::Duration;

use lobbybot_protocol::{BeatmapId, UserId};
use lobbybot_timer::TimerConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::search::SearchCriteria;
use crate::validate::ValidationRules;

// ---------------------------------------------------------------------------
// DifficultyRange
// ---------------------------------------------------------------------------

/// An inclusive star-rating range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRange {
    pub min: f64,
    pub max: f64,
}

impl DifficultyRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `stars` lies within `[min, max]`.
    pub fn contains(&self, stars: f64) -> bool {
        stars >= self.min && stars <= self.max
    }
}

impl Default for DifficultyRange {
    fn default() -> Self {
        Self {
            min: 3.99,
            max: 7.99,
        }
    }
}

impl fmt::Display for DifficultyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}*", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// DefaultItem
// ---------------------------------------------------------------------------

/// The item queued when a replacement is needed and the search finds none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultItem {
    pub beatmap_id: BeatmapId,
    pub checksum: String,
}

impl Default for DefaultItem {
    fn default() -> Self {
        Self {
            beatmap_id: BeatmapId(117_379),
            checksum: "5ad7319701409f19fac437b165875964".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Everything the coordinator needs to know about the room's rules.
///
/// `range` and `max_length` can be changed at runtime by the owner
/// (`!setdiff`, `!set-max-length`); the rest is fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Allowed effective difficulty.
    pub range: DifficultyRange,

    /// Longest allowed item, in seconds.
    pub max_length: u32,

    /// Ruleset name the catalog reports (`"osu"`).
    pub ruleset: String,

    /// Ruleset id used on the hub (0 = standard).
    pub ruleset_id: u8,

    /// Concurrent probes per search.
    pub probes: usize,

    /// Wall-clock limit for one search.
    pub search_timeout: Duration,

    /// Upper bound (exclusive) of the random beatmap ids probed.
    pub id_space: u64,

    /// Countdown once every non-spectator is ready.
    pub fast_countdown: Duration,

    /// Countdown once at least half are ready.
    pub majority_countdown: Duration,

    /// Fallback when a skip needs a replacement and the search finds none.
    pub default_item: DefaultItem,

    /// Answer to `!source`.
    pub source_url: String,

    /// Answer to `!discord`, if set.
    pub discord_link: Option<String>,

    /// The only user allowed to run privileged commands.
    pub owner: Option<UserId>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            range: DifficultyRange::default(),
            max_length: 600,
            ruleset: "osu".to_string(),
            ruleset_id: 0,
            probes: 16,
            search_timeout: Duration::from_secs(60),
            id_space: 3_787_482,
            fast_countdown: Duration::from_secs(5),
            majority_countdown: Duration::from_secs(30),
            default_item: DefaultItem::default(),
            source_url: "https://github.com/hashelq/osu-lazer-room-bot".to_string(),
            discord_link: None,
            owner: None,
        }
    }
}

impl LobbyConfig {
    /// Most probes a single search may run.
    pub const MAX_PROBES: usize = 64;

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - `probes` in `1..=MAX_PROBES`;
    /// - `range.min <= range.max` (swapped if reversed);
    /// - `id_space` at least 1;
    /// - `search_timeout` non-zero.
    pub fn validated(mut self) -> Self {
        if self.probes == 0 || self.probes > Self::MAX_PROBES {
            let clamped = self.probes.clamp(1, Self::MAX_PROBES);
            warn!(probes = self.probes, clamped, "probe count out of range, clamping");
            self.probes = clamped;
        }
        if self.range.min > self.range.max {
            warn!(min = self.range.min, max = self.range.max, "difficulty range reversed, swapping");
            std::mem::swap(&mut self.range.min, &mut self.range.max);
        }
        if self.id_space == 0 {
            warn!("id_space is 0, using 1");
            self.id_space = 1;
        }
        if self.search_timeout.is_zero() {
            warn!("search_timeout is 0, using default");
            self.search_timeout = Self::default().search_timeout;
        }
        self
    }

    /// The countdown lengths, for the start timer.
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            fast: self.fast_countdown,
            majority: self.majority_countdown,
        }
    }

    /// What the search must accept, under the current rules.
    pub fn search_criteria(&self) -> SearchCriteria {
        SearchCriteria {
            range: self.range,
            max_length: self.max_length,
            ruleset: self.ruleset.clone(),
            id_space: self.id_space,
        }
    }

    /// What the validator enforces, under the current rules.
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            range: self.range,
            max_length: self.max_length,
            ruleset: self.ruleset.clone(),
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }
}

/// Formats seconds as `M:SS`.
pub(crate) fn format_length(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
