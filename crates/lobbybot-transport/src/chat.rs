//! Chat delivery with a single retry.

use std::time::Duration;

use lobbybot_protocol::ChannelId;
use rand::Rng;
use tracing::warn;

use crate::{ApiError, Chat};

/// Backoff bounds, in seconds, before the one retry.
const RETRY_BACKOFF_SECS: std::ops::RangeInclusive<u64> = 1..=5;

/// Sends a chat message, retrying once after a random 1–5 s backoff.
///
/// Silenced/restricted/banned failures are returned immediately: another
/// attempt can't succeed and the caller has to know.
pub async fn send_with_retry<C: Chat>(
    chat: &C,
    channel: ChannelId,
    text: &str,
    is_action: bool,
) -> Result<(), ApiError> {
    match chat.send_message(channel, text, is_action).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_terminal() => Err(err),
        Err(err) => {
            let secs = rand::rng().random_range(RETRY_BACKOFF_SECS);
            warn!(%channel, error = %err, backoff_secs = secs, "chat send failed, retrying once");
            tokio::time::sleep(Duration::from_secs(secs)).await;
            chat.send_message(channel, text, is_action).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lobbybot_protocol::ChatMessage;

    use super::*;

    /// Fails with the scripted errors first, then succeeds.
    struct FlakyChat {
        failures: Mutex<Vec<ApiError>>,
        attempts: Mutex<u32>,
    }

    impl FlakyChat {
        fn new(failures: Vec<ApiError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                attempts: Mutex::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    impl Chat for FlakyChat {
        async fn send_message(
            &self,
            _channel: ChannelId,
            _text: &str,
            _is_action: bool,
        ) -> Result<(), ApiError> {
            *self.attempts.lock().unwrap() += 1;
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn poll_messages(
            &self,
            _channel: ChannelId,
            _since: u64,
        ) -> Result<Vec<ChatMessage>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_sends_once() {
        let chat = FlakyChat::new(vec![]);
        send_with_retry(&chat, ChannelId(1), "hi", false).await.unwrap();
        assert_eq!(chat.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_once() {
        let chat = FlakyChat::new(vec![ApiError::Transport("reset".into())]);
        let start = tokio::time::Instant::now();

        send_with_retry(&chat, ChannelId(1), "hi", false).await.unwrap();

        assert_eq!(chat.attempts(), 2);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited <= Duration::from_secs(5) + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_failure_is_returned() {
        let chat = FlakyChat::new(vec![
            ApiError::Transport("again".into()),
            ApiError::Transport("reset".into()),
        ]);
        let result = send_with_retry(&chat, ChannelId(1), "hi", false).await;
        assert!(matches!(result, Err(ApiError::Transport(_))));
        assert_eq!(chat.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_not_retried() {
        let chat = FlakyChat::new(vec![ApiError::Remote("you are silenced".into())]);
        let result = send_with_retry(&chat, ChannelId(1), "hi", false).await;
        assert!(matches!(result, Err(ApiError::Remote(_))));
        assert_eq!(chat.attempts(), 1);
    }
}
