//! End-to-end exercises of the realtime path against a loopback WebSocket
//! server: optimistic send and id promotion, echo dedup, offline sends, and
//! reconnect behavior.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use palaver_client::{ChatEvent, ChatSession, ClientConfig, ConnectionState, Draft, Socket};
use palaver_shared::Conversation;
use palaver_store::ChatCache;

fn conversation(id: &str) -> Conversation {
    Conversation {
        conversation_id: id.to_string(),
        name: format!("conversation {id}"),
        users: vec!["alice".to_string(), "bob".to_string()],
        creation_date_time: 0,
        markers: None,
        user_settings: None,
    }
}

fn seeded_cache() -> Arc<Mutex<ChatCache>> {
    let mut cache = ChatCache::new();
    cache.set_username("alice");
    cache.set_conversations(vec![conversation("c1")]);
    Arc::new(Mutex::new(cache))
}

fn config_for(port: u16) -> ClientConfig {
    ClientConfig {
        api_host: "127.0.0.1".to_string(),
        api_port: 1,
        ws_host: "127.0.0.1".to_string(),
        ws_port: port,
    }
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    tokio_tungstenite::accept_async(stream).await.expect("websocket handshake")
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ChatEvent>,
) -> ChatEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

#[tokio::test]
async fn test_send_then_id_promotes_optimistic_record() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        let frame = ws.next().await.expect("client frame").expect("read");
        let value: serde_json::Value =
            serde_json::from_str(frame.to_text().expect("text frame")).expect("json frame");
        assert_eq!(value["action"], "message");
        assert_eq!(value["data"]["conversationId"], "c1");
        assert_eq!(value["data"]["username"], "alice");
        assert_eq!(value["data"]["content"], "hi");
        assert_eq!(value["data"]["isMedia"], false);
        let temp_id = value["data"]["tempMessageId"]
            .as_str()
            .expect("temp id")
            .to_string();

        // Let the client inspect its optimistic state before we confirm.
        release_rx.await.expect("release signal");

        let reply = serde_json::json!({
            "action": "id",
            "data": {
                "messageId": "m1",
                "conversationId": "c1",
                "tempId": temp_id,
                "dateTime": 1000,
            }
        });
        ws.send(WsMessage::Text(reply.to_string())).await.expect("id reply");

        // Hold the socket open until the client disconnects.
        let _ = timeout(Duration::from_secs(5), ws.next()).await;
    });

    let cache = seeded_cache();
    let (mut session, mut events) = ChatSession::new(&config_for(port), Arc::clone(&cache));
    session.connect().await?;

    let temp_id = session.send_message(Draft::text("c1", "hi")).await?;
    {
        let cache = cache.lock().unwrap();
        assert_eq!(cache.message_count("c1"), 1);
        assert!(cache.contains_message("c1", &temp_id));
    }

    release_tx.send(()).expect("server alive");

    let event = next_event(&mut events).await;
    assert_eq!(
        event,
        ChatEvent::MessageConfirmed {
            conversation_id: "c1".to_string(),
            temp_id: temp_id.clone(),
            message_id: "m1".to_string(),
        }
    );

    {
        let cache = cache.lock().unwrap();
        assert_eq!(cache.message_count("c1"), 1);
        assert!(!cache.contains_message("c1", &temp_id));
        assert!(cache.contains_message("c1", "m1"));
        let stored = cache.messages("c1").next().expect("promoted record");
        assert_eq!(stored.content.as_str(), Some("hi"));
        assert_eq!(stored.date_time, 1000);
        assert_eq!(stored.username, "alice");
    }

    session.disconnect();
    server.await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_broadcast_does_not_grow_collection() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        for content in ["first", "second"] {
            let frame = serde_json::json!({
                "action": "message",
                "data": {
                    "messageId": "m9",
                    "conversationId": "c1",
                    "username": "bob",
                    "content": content,
                    "dateTime": 50,
                    "isMedia": false,
                }
            });
            ws.send(WsMessage::Text(frame.to_string())).await.expect("broadcast");
        }
        let _ = timeout(Duration::from_secs(5), ws.next()).await;
    });

    let cache = seeded_cache();
    let (mut session, mut events) = ChatSession::new(&config_for(port), Arc::clone(&cache));
    session.connect().await?;

    for _ in 0..2 {
        let event = next_event(&mut events).await;
        assert_eq!(
            event,
            ChatEvent::MessageReceived {
                conversation_id: "c1".to_string(),
                message_id: "m9".to_string(),
            }
        );
    }

    {
        let cache = cache.lock().unwrap();
        assert_eq!(cache.message_count("c1"), 1);
        let stored = cache.messages("c1").next().expect("record");
        assert_eq!(stored.content.as_str(), Some("second"));
    }

    session.disconnect();
    server.await?;
    Ok(())
}

#[tokio::test]
async fn test_offline_send_fails_but_keeps_optimistic_record() {
    let cache = seeded_cache();
    let (session, _events) = ChatSession::new(&config_for(1), Arc::clone(&cache));

    let result = session.send_message(Draft::text("c1", "hi")).await;
    assert!(matches!(
        result,
        Err(palaver_client::ClientError::NotConnected)
    ));

    // The optimistic insert stands; only the transmission failed.
    let cache = cache.lock().unwrap();
    assert_eq!(cache.message_count("c1"), 1);
    let pending = cache.messages("c1").next().expect("optimistic record");
    assert_eq!(pending.content.as_str(), Some("hi"));
}

#[tokio::test]
async fn test_reconnect_closes_previous_socket() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let mut first = accept_ws(&listener).await;
        let _second = accept_ws(&listener).await;
        // The replaced socket must be torn down, not leaked.
        let end = timeout(Duration::from_secs(5), first.next())
            .await
            .expect("first socket should terminate");
        assert!(matches!(end, None | Some(Err(_)) | Some(Ok(WsMessage::Close(_)))));
    });

    let mut socket = Socket::new(format!("ws://{addr}"));
    socket.connect().await?;
    assert_eq!(socket.state(), ConnectionState::Open);

    socket.connect().await?;
    assert_eq!(socket.state(), ConnectionState::Open);

    server.await?;
    socket.close();
    assert_eq!(socket.state(), ConnectionState::Closed);
    Ok(())
}
