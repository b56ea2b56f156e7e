//! WebSocket hub client using `tokio-tungstenite`.
//!
//! One socket carries both directions. A reader task decodes every
//! incoming [`Frame`]: events go to the `mpsc` receiver returned by
//! [`WebSocketHub::connect`], completions wake the caller waiting in
//! [`Hub::invoke`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lobbybot_protocol::{Codec, Frame, HubCommand, HubEvent, JsonCodec};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Hub, HubError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered hub events before the reader applies backpressure.
const EVENT_CHANNEL_SIZE: usize = 256;

/// How long an invocation may wait for its completion frame.
const INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Waiters keyed by invocation id. The value is the hub's error, if any.
type Pending = Mutex<HashMap<u64, oneshot::Sender<Option<String>>>>;

struct Shared<C: Codec> {
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    next_id: AtomicU64,
    codec: C,
}

/// A [`Hub`] backed by a WebSocket connection.
///
/// Cheap to clone; all clones share the socket.
pub struct WebSocketHub<C: Codec = JsonCodec> {
    shared: Arc<Shared<C>>,
}

impl<C: Codec> Clone for WebSocketHub<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl WebSocketHub<JsonCodec> {
    /// Connects with the JSON codec.
    pub async fn connect(
        url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::Receiver<HubEvent>), HubError> {
        Self::connect_with_codec(url, token, JsonCodec).await
    }
}

impl<C: Codec> WebSocketHub<C> {
    /// Connects to `url`, authenticating with a bearer `token`.
    ///
    /// Returns the hub handle and the receiver every room event is
    /// delivered on. The receiver closes when the socket does.
    pub async fn connect_with_codec(
        url: &str,
        token: &str,
        codec: C,
    ) -> Result<(Self, mpsc::Receiver<HubEvent>), HubError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| HubError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| HubError::Connect(e.to_string()))?;
        request.headers_mut().insert("Authorization", bearer);

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| HubError::Connect(e.to_string()))?;
        tracing::info!(url, "connected to multiplayer hub");

        let (sink, stream) = ws.split();
        let shared = Arc::new(Shared {
            sink: Mutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            codec,
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        tokio::spawn(read_frames(stream, Arc::clone(&shared), events_tx));

        Ok((Self { shared }, events_rx))
    }
}

impl<C: Codec> Hub for WebSocketHub<C> {
    async fn invoke(&self, command: HubCommand) -> Result<(), HubError> {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let method = command.method();
        tracing::debug!(id, method, "hub invoke");

        let bytes = shared.codec.encode(&Frame::Invocation { id, command })?;
        let text = String::from_utf8(bytes)
            .map_err(|e| HubError::SendFailed(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        shared.pending.lock().await.insert(id, reply_tx);

        let sent = shared.sink.lock().await.send(Message::text(text)).await;
        if let Err(e) = sent {
            shared.pending.lock().await.remove(&id);
            return Err(HubError::SendFailed(e.to_string()));
        }

        match tokio::time::timeout(INVOKE_TIMEOUT, reply_rx).await {
            Ok(Ok(None)) => Ok(()),
            Ok(Ok(Some(reason))) => Err(HubError::Rejected { method, reason }),
            Ok(Err(_)) => Err(HubError::Closed),
            Err(_) => {
                shared.pending.lock().await.remove(&id);
                Err(HubError::Timeout(method))
            }
        }
    }
}

/// Reader loop: routes frames until the socket closes, then fails every
/// outstanding invocation by dropping its waiter.
async fn read_frames<C: Codec>(
    mut stream: SplitStream<WsStream>,
    shared: Arc<Shared<C>>,
    events: mpsc::Sender<HubEvent>,
) {
    while let Some(msg) = stream.next().await {
        let data = match msg {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/raw frame
            Err(e) => {
                tracing::warn!(error = %e, "hub socket error");
                break;
            }
        };

        let frame: Frame = match shared.codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable hub frame");
                continue;
            }
        };

        match frame {
            Frame::Event { event } => {
                if events.send(event).await.is_err() {
                    tracing::debug!("event receiver dropped, stopping hub reader");
                    break;
                }
            }
            Frame::Completion { id, error } => {
                match shared.pending.lock().await.remove(&id) {
                    Some(waiter) => {
                        let _ = waiter.send(error);
                    }
                    None => tracing::debug!(id, "completion for unknown invocation"),
                }
            }
            Frame::Invocation { id, .. } => {
                tracing::debug!(id, "ignoring invocation sent by the hub");
            }
        }
    }

    shared.pending.lock().await.clear();
    tracing::info!("hub connection closed");
}
