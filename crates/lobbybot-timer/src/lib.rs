//! Auto-start countdown for lobbybot.
//!
//! A room has at most one countdown running. It is either the short
//! *fast* countdown (everyone is ready) or the long *majority* countdown
//! (at least half are ready). Arming always replaces whatever was armed
//! before, so two schedules can never coexist.
//!
//! # Integration
//!
//! The timer is designed to sit inside the room actor's `tokio::select!`
//! loop. While disarmed, [`StartTimer::wait_for_fire`] pends forever and
//! the other branches keep running:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* may arm or disarm */ }
//!         fired = timer.wait_for_fire() => { /* start the match */ }
//!     }
//! }
//! ```
//!
//! `wait_for_fire` is cancel-safe: dropping it before the deadline leaves
//! the timer untouched.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Countdown lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Countdown once every non-spectator is ready. Default: 5 s.
    pub fast: Duration,
    /// Countdown once at least half are ready. Default: 30 s.
    pub majority: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(5),
            majority: Duration::from_secs(30),
        }
    }
}

impl TimerConfig {
    /// Shortest countdown we accept.
    pub const MIN_COUNTDOWN: Duration = Duration::from_secs(1);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - both countdowns are at least [`Self::MIN_COUNTDOWN`];
    /// - the fast countdown is never longer than the majority one.
    pub fn validated(mut self) -> Self {
        if self.fast < Self::MIN_COUNTDOWN {
            warn!(fast = ?self.fast, "fast countdown too short, clamping");
            self.fast = Self::MIN_COUNTDOWN;
        }
        if self.majority < Self::MIN_COUNTDOWN {
            warn!(majority = ?self.majority, "majority countdown too short, clamping");
            self.majority = Self::MIN_COUNTDOWN;
        }
        if self.fast > self.majority {
            warn!(fast = ?self.fast, majority = ?self.majority, "fast countdown longer than majority, clamping");
            self.fast = self.majority;
        }
        self
    }

    /// Countdown length for `kind`.
    pub fn duration_for(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::Fast => self.fast,
            TimerKind::Majority => self.majority,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Which countdown is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Everyone is ready.
    Fast,
    /// At least half are ready.
    Majority,
}

/// Observable timer state: `Disarmed`, `ArmedFast` or `ArmedMajority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimerState {
    #[default]
    Disarmed,
    ArmedFast,
    ArmedMajority,
}

impl From<Option<TimerKind>> for TimerState {
    fn from(kind: Option<TimerKind>) -> Self {
        match kind {
            None => Self::Disarmed,
            Some(TimerKind::Fast) => Self::ArmedFast,
            Some(TimerKind::Majority) => Self::ArmedMajority,
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disarmed => "disarmed",
            Self::ArmedFast => "armed-fast",
            Self::ArmedMajority => "armed-majority",
        };
        f.write_str(name)
    }
}

/// Returned by [`StartTimer::wait_for_fire`] when a countdown elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub kind: TimerKind,
    /// Arm generation that fired. Each `arm` bumps it.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    kind: TimerKind,
    deadline: Instant,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A single one-shot countdown.
///
/// Firing disarms the timer, so a fired countdown never fires twice.
#[derive(Debug)]
pub struct StartTimer {
    config: TimerConfig,
    armed: Option<Armed>,
    generation: u64,
}

impl StartTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config: config.validated(),
            armed: None,
            generation: 0,
        }
    }

    /// Arms a countdown of `kind`, replacing any countdown already armed.
    pub fn arm(&mut self, kind: TimerKind) {
        self.arm_for(kind, self.config.duration_for(kind));
    }

    /// Arms a countdown of `kind` that fires after `after`.
    pub fn arm_for(&mut self, kind: TimerKind, after: Duration) {
        if let Some(previous) = self.armed.take() {
            debug!(previous = ?previous.kind, "replacing armed countdown");
        }
        self.generation += 1;
        self.armed = Some(Armed {
            kind,
            deadline: Instant::now() + after,
        });
        debug!(?kind, secs = after.as_secs_f64(), generation = self.generation, "countdown armed");
    }

    /// Cancels the armed countdown. Returns the kind that was cancelled.
    pub fn disarm(&mut self) -> Option<TimerKind> {
        let cancelled = self.armed.take().map(|armed| armed.kind);
        if let Some(kind) = cancelled {
            debug!(?kind, generation = self.generation, "countdown disarmed");
        }
        cancelled
    }

    /// Waits for the armed countdown to elapse.
    ///
    /// Pends forever while disarmed.
    pub async fn wait_for_fire(&mut self) -> Fired {
        let Some(armed) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(armed.deadline).await;

        self.armed = None;
        debug!(kind = ?armed.kind, generation = self.generation, "countdown fired");
        Fired {
            kind: armed.kind,
            generation: self.generation,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The armed kind, or `None` while disarmed.
    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.map(|armed| armed.kind)
    }

    pub fn state(&self) -> TimerState {
        self.kind().into()
    }

    /// Time left on the armed countdown.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .map(|armed| armed.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }
}

impl Default for StartTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
