//! Integration tests for the WebSocket hub client.
//!
//! These spin up a real WebSocket server on a random port and play the
//! hub's side of the conversation by hand.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use lobbybot_protocol::{Frame, HubCommand, HubEvent, UserId};
    use lobbybot_transport::{Hub, HubError, WebSocketHub};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on a random port and returns it with its ws:// url.
    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn send_frame(ws: &mut ServerWs, frame: &Frame) {
        let text = serde_json::to_string(frame).unwrap();
        ws.send(Message::text(text)).await.unwrap();
    }

    async fn recv_frame(ws: &mut ServerWs) -> Frame {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_events_are_delivered_to_receiver() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            send_frame(
                &mut ws,
                &Frame::Event {
                    event: HubEvent::UserJoined { user_id: UserId(9) },
                },
            )
            .await;
            // Keep the socket open until the client has read the event.
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let (_hub, mut events) = WebSocketHub::connect(&url, "token").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event should arrive")
            .expect("channel open");

        assert_eq!(event, HubEvent::UserJoined { user_id: UserId(9) });
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_succeeds_on_empty_completion() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let frame = recv_frame(&mut ws).await;
            let Frame::Invocation { id, command } = frame else {
                panic!("expected invocation, got {frame:?}");
            };
            assert_eq!(command, HubCommand::StartMatch);
            send_frame(&mut ws, &Frame::Completion { id, error: None }).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let (hub, _events) = WebSocketHub::connect(&url, "token").await.unwrap();
        hub.invoke(HubCommand::StartMatch).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_surfaces_hub_rejection() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let Frame::Invocation { id, .. } = recv_frame(&mut ws).await else {
                panic!("expected invocation");
            };
            send_frame(
                &mut ws,
                &Frame::Completion {
                    id,
                    error: Some("not the host".into()),
                },
            )
            .await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let (hub, _events) = WebSocketHub::connect(&url, "token").await.unwrap();
        let err = hub.invoke(HubCommand::StartMatch).await.unwrap_err();

        match err {
            HubError::Rejected { method, reason } => {
                assert_eq!(method, "StartMatch");
                assert_eq!(reason, "not the host");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_fails_when_socket_closes() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let _ = recv_frame(&mut ws).await;
            ws.close(None).await.unwrap();
        });

        let (hub, _events) = WebSocketHub::connect(&url, "token").await.unwrap();
        let err = hub.invoke(HubCommand::StartMatch).await.unwrap_err();

        assert!(matches!(err, HubError::Closed), "got {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_nothing_fails() {
        let (listener, url) = listen().await;
        drop(listener);
        let result = WebSocketHub::connect(&url, "token").await;
        assert!(matches!(result, Err(HubError::Connect(_))));
    }
}
