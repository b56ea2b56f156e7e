//! Lobby actor: the task that owns the [`Lobby`] and runs its effects.
//!
//! Four inputs feed one `tokio::select!` loop: hub events, commands from
//! [`LobbyHandle`]s, completions of background skips and refills, and the
//! start countdown. Each input is applied to the lobby in arrival order; the
//! effects it returns are spawned as supervised tasks so a slow lookup or
//! hub call never blocks the next event.
//!
//! Chat messages go through a single delivery task so the room sees them
//! in the order the lobby produced them.

use std::sync::Arc;

use lobbybot_lobby::NameCache;
use lobbybot_protocol::{
    Beatmap, BeatmapId, ChannelId, HubCommand, HubEvent, NewPlaylistItem, PlaylistItem,
    RawUserState, User, UserId,
};
use lobbybot_transport::{send_with_retry, Catalog, Chat, Hub};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::lobby::{ChatSender, Effect, Lobby, LobbyStatus};
use crate::mods;
use crate::playlist::PendingCount;
use crate::search::{ItemSearch, SearchCriteria, SearchMode, SearchOutcome};
use crate::task::supervise;
use crate::validate::{self, ItemFacts, Rejection, ValidationRules, Verdict};
use crate::{DefaultItem, LobbyConfig, LobbyError};

/// Bounded command channel; senders wait when the actor falls behind.
const COMMAND_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// The collaborators a lobby talks to.
pub struct Services<H, C, T> {
    pub hub: Arc<H>,
    pub catalog: Arc<C>,
    pub chat: Arc<T>,
    /// The room's chat channel.
    pub channel: ChannelId,
    /// Shared with the chat poller so both resolve names once.
    pub names: NameCache<C>,
}

impl<H, C: Catalog, T> Services<H, C, T> {
    pub fn new(hub: Arc<H>, catalog: Arc<C>, chat: Arc<T>, channel: ChannelId) -> Self {
        let names = NameCache::new(Arc::clone(&catalog));
        Self {
            hub,
            catalog,
            chat,
            channel,
            names,
        }
    }
}

impl<H, C, T> Clone for Services<H, C, T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            catalog: Arc::clone(&self.catalog),
            chat: Arc::clone(&self.chat),
            channel: self.channel,
            names: self.names.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum LobbyCommand {
    Chat {
        sender: ChatSender,
        content: String,
    },
    Status {
        reply: oneshot::Sender<LobbyStatus>,
    },
    Shutdown,
}

/// Internal notices from background tasks back to the actor.
enum Internal {
    SkipFinished,
    ReplenishFinished { queued: bool },
}

/// Handle to a running lobby actor.
///
/// Cheap to clone; clones feed the same actor.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    /// Delivers a chat message from `sender` (fire-and-forget).
    pub async fn chat(&self, sender: ChatSender, content: String) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Chat { sender, content })
            .await
            .map_err(|_| LobbyError::Unavailable)
    }

    /// Requests a status snapshot.
    pub async fn status(&self) -> Result<LobbyStatus, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::Status { reply: reply_tx })
            .await
            .map_err(|_| LobbyError::Unavailable)?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Worker: what background tasks carry
// ---------------------------------------------------------------------------

struct Outgoing {
    text: String,
    action: bool,
}

/// Everything a background task needs, cloned into each one.
struct Worker<H, C> {
    hub: Arc<H>,
    catalog: Arc<C>,
    names: NameCache<C>,
    search: ItemSearch<C>,
    outbox: mpsc::UnboundedSender<Outgoing>,
    pending: PendingCount,
    ruleset_id: u8,
    default_item: DefaultItem,
}

impl<H, C> Clone for Worker<H, C> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            catalog: Arc::clone(&self.catalog),
            names: self.names.clone(),
            search: self.search.clone(),
            outbox: self.outbox.clone(),
            pending: self.pending.clone(),
            ruleset_id: self.ruleset_id,
            default_item: self.default_item.clone(),
        }
    }
}

impl<H: Hub, C: Catalog> Worker<H, C> {
    fn say(&self, text: impl Into<String>, action: bool) {
        let _ = self.outbox.send(Outgoing {
            text: text.into(),
            action,
        });
    }

    async fn invoke(self, command: HubCommand) -> Result<(), LobbyError> {
        self.hub.invoke(command).await?;
        Ok(())
    }

    async fn greet(self, user: UserId) -> Result<(), LobbyError> {
        let name = self.names.resolve(user).await?;
        self.say(format!("+{name}"), false);
        Ok(())
    }

    /// Prepare, then start. Failures are logged and swallowed; the hub's
    /// later events tell us what actually happened.
    async fn start_match(self) -> Result<(), LobbyError> {
        let prepare = HubCommand::ChangeState {
            state: RawUserState::SPECTATING,
        };
        if let Err(e) = self.hub.invoke(prepare).await {
            warn!(error = %e, "could not prepare for match start");
        }
        match self.hub.invoke(HubCommand::StartMatch).await {
            Ok(()) => info!("match start requested"),
            Err(e) => warn!(error = %e, "match start failed"),
        }
        Ok(())
    }

    /// Runs a search, announcing a timeout to the room.
    async fn find(&self, criteria: SearchCriteria, mode: SearchMode) -> Option<Beatmap> {
        match self.search.run(criteria, mode).await {
            SearchOutcome::Found(beatmap) => Some(beatmap),
            SearchOutcome::NotNeeded => None,
            SearchOutcome::TimedOut => {
                warn!("search found no item before the timeout");
                self.say("Could not find a suitable map in time.", true);
                None
            }
        }
    }

    async fn add_item(&self, beatmap_id: BeatmapId, checksum: String) -> Result<(), LobbyError> {
        let item = NewPlaylistItem {
            beatmap_id,
            beatmap_checksum: checksum,
            ruleset_id: self.ruleset_id,
            required_mods: Vec::new(),
            allowed_mods: mods::legal_allowed_mods(&[]),
        };
        self.hub.invoke(HubCommand::AddPlaylistItem { item }).await?;
        info!(beatmap = %beatmap_id, "item queued");
        Ok(())
    }

    /// Returns whether an item was queued.
    async fn replenish(self, criteria: SearchCriteria) -> Result<bool, LobbyError> {
        let mode = SearchMode::OnlyIfNeeded(self.pending.clone());
        let Some(beatmap) = self.find(criteria, mode).await else {
            return Ok(false);
        };
        if self.pending.get() > 0 {
            debug!(beatmap = %beatmap.id, "playlist filled meanwhile, dropping found item");
            return Ok(false);
        }
        self.add_item(beatmap.id, beatmap.checksum).await?;
        Ok(true)
    }

    async fn skip(
        self,
        current: Option<PlaylistItem>,
        needs_replacement: bool,
        criteria: SearchCriteria,
    ) -> Result<(), LobbyError> {
        let Some(current) = current else {
            error!("skip vote passed but there is no current playlist item");
            return Ok(());
        };

        if needs_replacement {
            let (beatmap_id, checksum) = match self.find(criteria, SearchMode::Unconditional).await {
                Some(beatmap) => (beatmap.id, beatmap.checksum),
                None => {
                    warn!(beatmap = %self.default_item.beatmap_id, "falling back to the default item");
                    (self.default_item.beatmap_id, self.default_item.checksum.clone())
                }
            };
            self.add_item(beatmap_id, checksum).await?;
        }

        self.hub
            .invoke(HubCommand::RemovePlaylistItem { item_id: current.id })
            .await?;
        info!(item = %current.id, "current item skipped");
        Ok(())
    }

    async fn validate(
        self,
        item: PlaylistItem,
        rules: ValidationRules,
        criteria: SearchCriteria,
    ) -> Result<(), LobbyError> {
        let (stars, beatmap) = tokio::join!(
            self.catalog.beatmap_attributes(item.beatmap_id, &rules.ruleset),
            self.catalog.lookup_beatmap(item.beatmap_id),
        );
        let star_rating = stars.unwrap_or_else(|e| {
            warn!(item = %item.id, error = %e, "attributes lookup failed, using hub rating");
            item.star_rating
        });
        let facts = ItemFacts {
            star_rating,
            total_length: beatmap?.total_length,
        };

        match validate::check(&item, facts, &rules) {
            Verdict::Accept => {
                debug!(item = %item.id, "item accepted");
                Ok(())
            }
            Verdict::Repair { allowed } => {
                info!(item = %item.id, "restoring allowed mods");
                let repaired = PlaylistItem {
                    allowed_mods: allowed,
                    ..item
                };
                if let Err(e) = self.hub.invoke(HubCommand::EditPlaylistItem { item: repaired }).await {
                    warn!(error = %e, "allowed-mod repair failed");
                }
                Ok(())
            }
            Verdict::Reject(rejection) => self.reject(item, rejection, criteria).await,
        }
    }

    /// Announces the rejection, then removes the item. If the hub refuses
    /// the removal, overwrites the item with a random one instead.
    async fn reject(
        &self,
        item: PlaylistItem,
        rejection: Rejection,
        criteria: SearchCriteria,
    ) -> Result<(), LobbyError> {
        let name = match self.names.resolve(item.owner_id).await {
            Ok(name) => name.to_string(),
            Err(e) => {
                warn!(user = %item.owner_id, error = %e, "could not resolve item owner");
                item.owner_id.to_string()
            }
        };
        info!(item = %item.id, owner = %item.owner_id, ?rejection, "rejecting item");
        self.say(rejection.message(&name), false);

        let removal = self
            .hub
            .invoke(HubCommand::RemovePlaylistItem { item_id: item.id })
            .await;
        let Err(e) = removal else {
            return Ok(());
        };

        warn!(item = %item.id, error = %e, "removal refused, replacing in place");
        let item_id = item.id;
        let Some(beatmap) = self.find(criteria, SearchMode::Unconditional).await else {
            error!(item = %item_id, "no replacement for rejected item");
            return Err(LobbyError::RemediationFailed(item_id));
        };

        let replacement = PlaylistItem {
            beatmap_id: beatmap.id,
            beatmap_checksum: beatmap.checksum,
            required_mods: Vec::new(),
            allowed_mods: mods::legal_allowed_mods(&[]),
            star_rating: beatmap.difficulty_rating,
            ..item
        };
        if let Err(e) = self
            .hub
            .invoke(HubCommand::EditPlaylistItem { item: replacement })
            .await
        {
            error!(item = %item_id, error = %e, "replacing rejected item failed");
            return Err(LobbyError::RemediationFailed(item_id));
        }
        info!(item = %item_id, beatmap = %beatmap.id, "rejected item replaced");
        Ok(())
    }
}

/// Posts queued messages one at a time.
async fn deliver<T: Chat>(chat: Arc<T>, channel: ChannelId, mut outbox: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some(msg) = outbox.recv().await {
        info!(%channel, text = %msg.text, "sending chat message");
        if let Err(e) = send_with_retry(chat.as_ref(), channel, &msg.text, msg.action).await {
            if e.is_terminal() {
                error!(%channel, error = %e, "chat refused: account cannot post");
            } else {
                warn!(%channel, error = %e, "chat message dropped");
            }
        }
    }
    debug!("chat delivery stopped");
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct LobbyActor<H, C> {
    lobby: Lobby,
    worker: Worker<H, C>,
    events: mpsc::Receiver<HubEvent>,
    commands: mpsc::Receiver<LobbyCommand>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
}

impl<H: Hub, C: Catalog> LobbyActor<H, C> {
    /// Runs until shutdown or until the hub event stream ends.
    async fn run(mut self) {
        info!(me = %self.lobby.me(), "lobby actor started");

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        warn!("hub event stream closed");
                        break;
                    };
                    debug!(?event, "hub event");
                    let effects = self.lobby.on_event(event);
                    self.dispatch(effects);
                }
                Some(command) = self.commands.recv() => {
                    match command {
                        LobbyCommand::Chat { sender, content } => {
                            let effects = self.lobby.on_command(&sender, &content);
                            self.dispatch(effects);
                        }
                        LobbyCommand::Status { reply } => {
                            let _ = reply.send(self.lobby.status());
                        }
                        LobbyCommand::Shutdown => {
                            info!("lobby shutting down");
                            break;
                        }
                    }
                }
                Some(notice) = self.internal_rx.recv() => {
                    match notice {
                        Internal::SkipFinished => {
                            let effects = self.lobby.on_skip_finished();
                            self.dispatch(effects);
                        }
                        Internal::ReplenishFinished { queued } => {
                            self.lobby.on_replenish_finished(queued);
                        }
                    }
                }
                fired = self.lobby.timer.wait_for_fire() => {
                    let effects = self.lobby.on_timer_fired(fired);
                    self.dispatch(effects);
                }
            }
        }

        info!("lobby actor stopped");
    }

    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            let worker = self.worker.clone();
            match effect {
                Effect::Say { text, action } => worker.say(text, action),
                Effect::Greet(user) => {
                    supervise("greet", worker.greet(user));
                }
                Effect::Invoke(command) => {
                    supervise("invoke", worker.invoke(command));
                }
                Effect::StartMatch => {
                    supervise("start-match", worker.start_match());
                }
                Effect::Validate {
                    item,
                    rules,
                    criteria,
                } => {
                    supervise("validate", worker.validate(item, rules, criteria));
                }
                Effect::Replenish { criteria } => {
                    let done = self.internal_tx.clone();
                    supervise("replenish", async move {
                        let result = worker.replenish(criteria).await;
                        let queued = matches!(result, Ok(true));
                        let _ = done.send(Internal::ReplenishFinished { queued });
                        result.map(|_| ())
                    });
                }
                Effect::Skip {
                    current,
                    needs_replacement,
                    criteria,
                } => {
                    let done = self.internal_tx.clone();
                    supervise("skip", async move {
                        let result = worker.skip(current, needs_replacement, criteria).await;
                        let _ = done.send(Internal::SkipFinished);
                        result
                    });
                }
            }
        }
    }
}

/// Spawns the lobby actor and its chat delivery task.
///
/// `me` is the account we run as; `playlist` is what the room was created
/// with; `events` is the hub's event stream. The returned join handle
/// finishes when the actor stops.
pub fn spawn_lobby<H: Hub, C: Catalog, T: Chat>(
    config: LobbyConfig,
    me: &User,
    services: Services<H, C, T>,
    playlist: Vec<PlaylistItem>,
    events: mpsc::Receiver<HubEvent>,
) -> (LobbyHandle, JoinHandle<()>) {
    let mut lobby = Lobby::new(config, me.id);
    lobby.seed_playlist(playlist);
    let config = lobby.config();
    services.names.insert(me.id, &me.username);

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    tokio::spawn(deliver(Arc::clone(&services.chat), services.channel, outbox_rx));

    let worker = Worker {
        hub: services.hub,
        catalog: Arc::clone(&services.catalog),
        names: services.names,
        search: ItemSearch::new(services.catalog, config.probes, config.search_timeout),
        outbox: outbox_tx,
        pending: lobby.pending_handle(),
        ruleset_id: config.ruleset_id,
        default_item: config.default_item.clone(),
    };

    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let actor = LobbyActor {
        lobby,
        worker,
        events,
        commands: rx,
        internal_tx,
        internal_rx,
    };

    let join = tokio::spawn(actor.run());
    (LobbyHandle { sender: tx }, join)
}
