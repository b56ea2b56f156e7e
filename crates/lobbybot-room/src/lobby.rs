//! The lobby state machine.
//!
//! [`Lobby`] owns every piece of lobby state: player readiness, the start
//! countdown, skip votes, and the playlist cache. Each handler applies one
//! input (a hub event, a chat command, a fired countdown) and returns the
//! [`Effect`]s the actor should carry out. Nothing here touches the
//! network, which is what lets the tests drive it event by event.

use lobbybot_lobby::{half, LobbySnapshot, Observed, PlayerTracker, ReadyState, SkipVotes};
use lobbybot_protocol::{
    HubCommand, HubEvent, PlaylistItem, PlaylistItemId, RawUserState, RoomStatus, UserId,
};
use lobbybot_timer::{Fired, StartTimer, TimerKind, TimerState};
use rand::Rng;
use tracing::{debug, info};

use crate::autostart;
use crate::commands::{ChatCommand, USER_COMMANDS};
use crate::config::{format_length, LobbyConfig};
use crate::mods::{ALL_MODS, REQUIRED_MODS};
use crate::playlist::{PendingCount, PlaylistIndex};
use crate::search::SearchCriteria;
use crate::validate::{self, ValidationRules};

const NO_DISCORD: &str = "Owner has not set a discord link";

/// Who sent a chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSender {
    pub id: UserId,
    pub name: String,
}

/// Work the actor carries out on the lobby's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Post to the room chat. `action` renders as `/me`.
    Say { text: String, action: bool },
    /// Resolve the user's name and announce `+<name>`.
    Greet(UserId),
    /// Run a hub command; failures are logged.
    Invoke(HubCommand),
    /// Prepare and start the match.
    StartMatch,
    /// Check an item against the rules and remediate. `criteria` drives
    /// the replacement search if the item can't be removed.
    Validate {
        item: PlaylistItem,
        rules: ValidationRules,
        criteria: SearchCriteria,
    },
    /// Queue a random item unless the playlist fills up first. The actor
    /// reports back with [`Lobby::on_replenish_finished`].
    Replenish { criteria: SearchCriteria },
    /// Swap out the current item. The actor reports back with
    /// [`Lobby::on_skip_finished`].
    Skip {
        current: Option<PlaylistItem>,
        needs_replacement: bool,
        criteria: SearchCriteria,
    },
}

fn say(text: impl Into<String>) -> Effect {
    Effect::Say {
        text: text.into(),
        action: false,
    }
}

fn act(text: impl Into<String>) -> Effect {
    Effect::Say {
        text: text.into(),
        action: true,
    }
}

/// A point-in-time view of the lobby, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbyStatus {
    /// Whether we hold host and act on the room.
    pub active: bool,
    pub players: usize,
    pub ready: usize,
    pub spectating: usize,
    pub timer: TimerState,
    pub pending_items: usize,
    pub current_item: Option<PlaylistItemId>,
    pub skip_votes: usize,
    pub skipping: bool,
    pub range: crate::DifficultyRange,
    pub max_length: u32,
}

/// Progress of the one refill allowed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refill {
    Idle,
    Searching,
    /// Added on the hub; waiting for its event to reach the cache.
    Queued,
}

/// The lobby coordinator's state.
pub struct Lobby {
    config: LobbyConfig,
    me: UserId,
    /// Set while we hold host. Bookkeeping continues either way.
    active: bool,
    players: PlayerTracker,
    votes: SkipVotes,
    playlist: PlaylistIndex,
    pub(crate) timer: StartTimer,
    skipping: bool,
    refill: Refill,
    /// The item that was current when the running match started.
    match_item: Option<PlaylistItemId>,
}

impl Lobby {
    /// A fresh lobby for the room we just created (and therefore host).
    pub fn new(config: LobbyConfig, me: UserId) -> Self {
        let config = config.validated();
        let timer = StartTimer::new(config.timer_config());
        Self {
            config,
            me,
            active: true,
            players: PlayerTracker::new(),
            votes: SkipVotes::new(),
            playlist: PlaylistIndex::new(),
            timer,
            skipping: false,
            refill: Refill::Idle,
            match_item: None,
        }
    }

    /// Loads the playlist the room was created with. These items are ours,
    /// so none of them is validated.
    pub fn seed_playlist(&mut self, items: impl IntoIterator<Item = PlaylistItem>) {
        for item in items {
            self.playlist.upsert(item);
        }
        info!(pending = self.playlist.pending_count(), "playlist seeded");
    }

    // -----------------------------------------------------------------------
    // Hub events
    // -----------------------------------------------------------------------

    /// Applies one hub event.
    pub fn on_event(&mut self, event: HubEvent) -> Vec<Effect> {
        match event {
            HubEvent::UserJoined { user_id } => self.on_user_joined(user_id),
            HubEvent::UserLeft { user_id } | HubEvent::UserKicked { user_id } => {
                self.on_user_left(user_id)
            }
            HubEvent::HostChanged { user_id } => self.on_host_changed(user_id),
            HubEvent::UserStateChanged { user_id, state } => {
                self.on_user_state_changed(user_id, state)
            }
            HubEvent::RoomStateChanged { state } => self.on_room_state(RoomStatus::from_code(state)),
            HubEvent::PlaylistItemAdded { item } | HubEvent::PlaylistItemChanged { item } => {
                self.on_item(item)
            }
            HubEvent::PlaylistItemRemoved { item_id } => {
                if self.playlist.remove(item_id).is_some() {
                    info!(item = %item_id, pending = self.playlist.pending_count(), "playlist item removed");
                }
                self.replenish_if_needed()
            }
        }
    }

    fn on_user_joined(&mut self, user: UserId) -> Vec<Effect> {
        if user == self.me {
            return Vec::new();
        }
        self.players.observe(user, ReadyState::Idle);
        info!(%user, players = self.players.len(), "player joined");

        let mut effects = vec![Effect::Greet(user)];
        effects.extend(self.reevaluate());
        effects
    }

    fn on_user_left(&mut self, user: UserId) -> Vec<Effect> {
        if let Observed::Removed { .. } = self.players.observe(user, ReadyState::Absent) {
            info!(%user, players = self.players.len(), "player left");
        }

        let mut effects = Vec::new();
        if self.votes.retract(user) {
            debug!(%user, "skip vote retracted");
        }
        if self.active && self.votes.count() > 0 {
            effects.extend(self.check_skip_quorum(false));
        }
        effects.extend(self.reevaluate());
        effects
    }

    fn on_host_changed(&mut self, user: UserId) -> Vec<Effect> {
        info!(%user, "host changed");
        if user != self.me {
            return Vec::new();
        }
        self.active = true;
        if self.refill == Refill::Queued {
            self.refill = Refill::Idle;
        }
        info!("we are the host now");

        let mut effects = vec![say("I am the host now")];
        effects.extend(self.reevaluate());
        effects.extend(self.replenish_if_needed());
        effects
    }

    fn on_user_state_changed(&mut self, user: UserId, raw: RawUserState) -> Vec<Effect> {
        if user == self.me {
            return Vec::new();
        }
        let Some(state) = ReadyState::from_raw(raw) else {
            return Vec::new();
        };
        self.players.observe(user, state);
        self.reevaluate()
    }

    fn on_room_state(&mut self, status: RoomStatus) -> Vec<Effect> {
        debug!(?status, "room state changed");
        match status {
            RoomStatus::MatchStarted => {
                self.timer.disarm();
                let reset = self.players.reset_ready();
                self.votes.clear();
                self.match_item = self.playlist.current().map(|item| item.id);
                info!(reset, item = ?self.match_item, "match started");
                vec![act("Match started!")]
            }
            RoomStatus::MatchFinished => {
                // The played-item event may have purged it already.
                if let Some(id) = self.match_item.take() {
                    if self.playlist.remove(id).is_some() {
                        debug!(item = %id, "finished item dropped from cache");
                    }
                }
                self.replenish_if_needed()
            }
            RoomStatus::Open | RoomStatus::Other(_) => Vec::new(),
        }
    }

    fn on_item(&mut self, item: PlaylistItem) -> Vec<Effect> {
        let validate = self.active && validate::needs_validation(&item, self.me);
        let pending = self.playlist.upsert(item.clone());
        debug!(item = %item.id, pending, count = self.playlist.pending_count(), "playlist item updated");

        if !pending {
            return self.replenish_if_needed();
        }
        if self.refill == Refill::Queued {
            debug!(item = %item.id, "queued refill arrived");
            self.refill = Refill::Idle;
        }
        if validate {
            return vec![Effect::Validate {
                item,
                rules: self.config.validation_rules(),
                criteria: self.config.search_criteria(),
            }];
        }
        Vec::new()
    }

    fn replenish_if_needed(&mut self) -> Vec<Effect> {
        if !self.active || self.playlist.pending_count() > 0 {
            return Vec::new();
        }
        if self.refill != Refill::Idle {
            debug!(refill = ?self.refill, "refill already in flight");
            return Vec::new();
        }
        self.refill = Refill::Searching;
        info!("playlist is empty, adding a random item");
        vec![Effect::Replenish {
            criteria: self.config.search_criteria(),
        }]
    }

    /// The refill task finished. `queued` is set if it added an item.
    pub fn on_replenish_finished(&mut self, queued: bool) {
        // The added item's event may already be here.
        self.refill = if queued && self.playlist.pending_count() == 0 {
            Refill::Queued
        } else {
            Refill::Idle
        };
        debug!(queued, refill = ?self.refill, "refill finished");
    }

    // -----------------------------------------------------------------------
    // Auto-start
    // -----------------------------------------------------------------------

    /// Re-runs the auto-start decision against the current counts.
    fn reevaluate(&mut self) -> Vec<Effect> {
        if !self.active || self.is_skipping() {
            return Vec::new();
        }

        let snapshot = self.players.snapshot();
        let eval = autostart::evaluate(snapshot, self.timer.kind());
        debug!(?snapshot, armed = ?self.timer.kind(), ?eval, "auto-start evaluated");

        let mut effects = Vec::new();
        if eval.cancel {
            self.timer.disarm();
            info!(ready = snapshot.ready, "start countdown cancelled");
            effects.push(act("Fast start aborted."));
        }
        match eval.arm {
            Some(TimerKind::Fast) => {
                self.timer.arm(TimerKind::Fast);
                let secs = self.timer.config().fast.as_secs();
                info!(ready = snapshot.ready, secs, "everyone ready, fast countdown armed");
                effects.push(act(format!(
                    "All players are ready, starting match in {secs} seconds!"
                )));
            }
            Some(TimerKind::Majority) => {
                self.timer.arm(TimerKind::Majority);
                let secs = self.timer.config().majority.as_secs();
                info!(ready = snapshot.ready, secs, "majority ready, countdown armed");
                effects.push(act(format!(
                    "{} players are ready, starting match in {secs} seconds!",
                    snapshot.ready
                )));
            }
            None => {}
        }
        effects
    }

    /// A countdown elapsed.
    pub fn on_timer_fired(&mut self, fired: Fired) -> Vec<Effect> {
        debug!(kind = ?fired.kind, generation = fired.generation, "start countdown fired");
        self.start_match()
    }

    fn start_match(&mut self) -> Vec<Effect> {
        self.timer.disarm();
        if self.players.snapshot().ready == 0 {
            info!("nobody is ready any more, not starting");
            return Vec::new();
        }
        info!("starting match");
        vec![Effect::StartMatch]
    }

    // -----------------------------------------------------------------------
    // Skip votes
    // -----------------------------------------------------------------------

    fn request_skip(&mut self, voter: UserId) -> Vec<Effect> {
        if self.is_skipping() {
            debug!(%voter, "skip already in progress, vote ignored");
            return Vec::new();
        }
        if !self.votes.cast(voter) {
            debug!(%voter, "duplicate skip vote");
            return Vec::new();
        }
        self.check_skip_quorum(true)
    }

    /// Votes needed to skip right now: half the non-spectators, at least 1.
    fn skip_quorum(&self) -> usize {
        half(self.players.snapshot().need_for_start()).max(1)
    }

    fn check_skip_quorum(&mut self, announce_remaining: bool) -> Vec<Effect> {
        let votes = self.votes.count();
        let quorum = self.skip_quorum();
        if votes >= quorum {
            return self.begin_skip();
        }
        if !announce_remaining {
            return Vec::new();
        }
        vec![say(format!(
            "{votes}/{quorum} votes to skip, {} more needed.",
            quorum - votes
        ))]
    }

    fn begin_skip(&mut self) -> Vec<Effect> {
        if self.skipping {
            return Vec::new();
        }
        self.skipping = true;

        self.timer.disarm();
        let current = self.playlist.current().cloned();
        let needs_replacement = self.playlist.pending_count() <= 1;
        info!(
            item = ?current.as_ref().map(|item| item.id),
            votes = self.votes.count(),
            needs_replacement,
            "skip vote passed"
        );

        vec![
            say("Skip vote passed, skipping the current map."),
            Effect::Skip {
                current,
                needs_replacement,
                criteria: self.config.search_criteria(),
            },
        ]
    }

    /// The skip task finished (successfully or not).
    pub fn on_skip_finished(&mut self) -> Vec<Effect> {
        self.votes.clear();
        self.players.reset_ready();
        self.skipping = false;
        debug!("skip finished");
        self.reevaluate()
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    // -----------------------------------------------------------------------
    // Chat commands
    // -----------------------------------------------------------------------

    /// Handles one chat message. Non-commands produce nothing.
    pub fn on_command(&mut self, sender: &ChatSender, content: &str) -> Vec<Effect> {
        if sender.id == self.me || !self.active {
            return Vec::new();
        }
        let Some(command) = ChatCommand::parse(content, self.config.is_owner(sender.id)) else {
            return Vec::new();
        };
        debug!(user = %sender.id, ?command, "chat command");

        match command {
            ChatCommand::Help => {
                let list: Vec<String> = USER_COMMANDS.iter().map(|c| format!("!{c}")).collect();
                vec![say(format!("Available commands: {}", list.join(", ")))]
            }
            ChatCommand::Diffs => vec![say(format!("Difficulty range is {}", self.config.range))],
            ChatCommand::MaxLength => vec![say(format!(
                "Max length is {}",
                format_length(self.config.max_length)
            ))],
            ChatCommand::Source => vec![say(self.config.source_url.clone())],
            ChatCommand::Discord => vec![say(
                self.config.discord_link.as_deref().unwrap_or(NO_DISCORD),
            )],
            ChatCommand::Mods => vec![say(format!("Available mods: {}", ALL_MODS.join(", ")))],
            ChatCommand::Violation => vec![say(format!(
                "Maps must be {}, at most {} long, and may only require {}. Other maps are removed.",
                self.config.range,
                format_length(self.config.max_length),
                REQUIRED_MODS.join(", "),
            ))],
            ChatCommand::Roll { min, max } => {
                let n = rand::rng().random_range(min..=max);
                vec![say(format!("{} rolls {n} ({min}-{max})", sender.name))]
            }
            ChatCommand::Skip => self.request_skip(sender.id),
            ChatCommand::Start => self.start_match(),
            ChatCommand::Host => {
                self.active = false;
                self.timer.disarm();
                self.votes.clear();
                info!(to = %sender.id, "transferring host, going inactive");
                vec![
                    Effect::Invoke(HubCommand::TransferHost { user_id: sender.id }),
                    say(format!("Host transferred to {}", sender.name)),
                ]
            }
            ChatCommand::SetMaxLength(secs) => {
                self.config.max_length = secs;
                info!(secs, "max length changed");
                vec![say(format!("Max length set to {}", format_length(secs)))]
            }
            ChatCommand::SetDiff(range) => {
                self.config.range = range;
                info!(min = range.min, max = range.max, "difficulty range changed");
                vec![say(format!("Difficulty range set to {range}"))]
            }
            ChatCommand::Usage(text) => vec![say(text)],
            ChatCommand::Unknown(name) => vec![say(format!("Unknown command: {name}"))],
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> LobbySnapshot {
        self.players.snapshot()
    }

    pub fn status(&self) -> LobbyStatus {
        let snapshot = self.players.snapshot();
        LobbyStatus {
            active: self.active,
            players: snapshot.players,
            ready: snapshot.ready,
            spectating: snapshot.spectating,
            timer: self.timer.state(),
            pending_items: self.playlist.pending_count(),
            current_item: self.playlist.current().map(|item| item.id),
            skip_votes: self.votes.count(),
            skipping: self.is_skipping(),
            range: self.config.range,
            max_length: self.config.max_length,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn me(&self) -> UserId {
        self.me
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    /// Live pending-item count, for "only if needed" searches.
    pub fn pending_handle(&self) -> PendingCount {
        self.playlist.pending_handle()
    }
}
