//! Chat polling: reads the room channel and feeds commands to the lobby.

use std::sync::Arc;
use std::time::Duration;

use lobbybot_lobby::NameCache;
use lobbybot_protocol::{ChannelId, ChatMessage, UserId};
use lobbybot_room::{ChatSender, LobbyError, LobbyHandle};
use lobbybot_transport::{Catalog, Chat};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often the channel is polled.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls one chat channel and forwards `!` messages to a lobby.
pub struct ChatPoller<C, T> {
    chat: Arc<T>,
    channel: ChannelId,
    me: UserId,
    names: NameCache<C>,
    lobby: LobbyHandle,
    interval: Duration,
    /// Highest message id seen so far.
    last_seen: u64,
}

impl<C: Catalog, T: Chat> ChatPoller<C, T> {
    pub fn new(
        chat: Arc<T>,
        channel: ChannelId,
        me: UserId,
        names: NameCache<C>,
        lobby: LobbyHandle,
    ) -> Self {
        Self {
            chat,
            channel,
            me,
            names,
            lobby,
            interval: POLL_INTERVAL,
            last_seen: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Polls until the lobby stops accepting messages.
    ///
    /// Failed polls are logged and retried on the next tick.
    pub async fn run(mut self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(channel = %self.channel, "chat polling started");

        loop {
            ticker.tick().await;
            let messages = match self.chat.poll_messages(self.channel, self.last_seen).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "chat poll failed");
                    continue;
                }
            };
            if self.forward(messages).await.is_err() {
                debug!("lobby stopped accepting chat");
                break;
            }
        }

        info!(channel = %self.channel, "chat polling stopped");
    }

    /// Forwards one batch, oldest first, and advances the cursor.
    async fn forward(&mut self, mut messages: Vec<ChatMessage>) -> Result<(), LobbyError> {
        messages.sort_by_key(|m| m.message_id);

        for message in messages {
            if message.message_id <= self.last_seen {
                continue;
            }
            self.last_seen = message.message_id;

            if message.sender_id == self.me || !message.content.trim_start().starts_with('!') {
                continue;
            }

            let name = match self.names.resolve(message.sender_id).await {
                Ok(name) => name.to_string(),
                Err(e) => {
                    warn!(user = %message.sender_id, error = %e, "could not resolve sender");
                    message.sender_id.to_string()
                }
            };
            debug!(user = %message.sender_id, content = %message.content, "chat command received");

            let sender = ChatSender {
                id: message.sender_id,
                name,
            };
            self.lobby.chat(sender, message.content).await?;
        }
        Ok(())
    }
}
