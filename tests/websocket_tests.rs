use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use natter::server::router::build_router;
use natter::server::state::AppState;
use natter::storage::Storage;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (String, String, oneshot::Sender<()>) {
    let storage = Storage::open_in_memory().expect("open storage");
    start_server_with(storage).await
}

async fn start_server_with(storage: Storage) -> (String, String, oneshot::Sender<()>) {
    let state = AppState::new(storage);
    let app: Router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind server");
    let addr = listener.local_addr().expect("server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    (
        format!("http://{}", addr),
        format!("ws://{}/ws", addr),
        shutdown_tx,
    )
}

async fn connect(ws_url: &str) -> WsClient {
    let (client, _) = connect_async(ws_url).await.expect("connect websocket");
    client
}

async fn send_event(client: &mut WsClient, event: serde_json::Value) {
    client
        .send(Message::Text(event.to_string()))
        .await
        .expect("send event");
}

/// Wait for the next text frame and parse it as an event.
async fn recv_event(client: &mut WsClient) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("websocket error");
    match frame {
        Message::Text(text) => serde_json::from_str(&text).expect("event json"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

/// Assert that no frame arrives within a short window.
async fn assert_no_event(client: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "expected no further events");
}

fn get_text(base_url: &str, path: &str) -> (u16, String) {
    let response = ureq::get(&format!("{}{}", base_url, path))
        .call()
        .expect("get request");
    let status = response.status();
    (status, response.into_string().expect("response body"))
}

fn active_connections(base_url: &str) -> usize {
    let (_, body) = get_text(base_url, "/health");
    let health: serde_json::Value = serde_json::from_str(&body).expect("health json");
    health["active_connections"].as_u64().expect("count") as usize
}

/// Poll `/health` until the reported connection count matches.
///
/// Registration and deregistration happen inside the connection task, so
/// they can trail the client-side handshake or disconnect slightly.
async fn wait_for_active(base_url: &str, expected: usize) {
    for _ in 0..100 {
        let count = tokio::task::spawn_blocking({
            let base_url = base_url.to_string();
            move || active_connections(&base_url)
        })
        .await
        .expect("health task");
        if count == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("active_connections never reached {expected}");
}

#[tokio::test]
async fn send_message_is_persisted_and_broadcast_to_everyone() {
    let (base_url, ws_url, shutdown_tx) = start_server().await;

    let mut sender = connect(&ws_url).await;
    // Neither bystander is the message's receiver; both still get the event
    let mut bystander = connect(&ws_url).await;

    send_event(
        &mut sender,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "hi bob",
            },
        }),
    )
    .await;

    for client in [&mut sender, &mut bystander] {
        let event = recv_event(client).await;
        assert_eq!(event["event"], "receiveMessage");
        assert_eq!(event["data"]["sender"], "alice@example.com");
        assert_eq!(event["data"]["receiver"], "bob@example.com");
        assert_eq!(event["data"]["body"], "hi bob");
        assert_eq!(event["data"]["status"], "sent");
        assert!(event["data"]["id"].as_i64().expect("id") > 0);
        assert!(event["data"]["timestamp"].as_u64().expect("timestamp") > 0);
    }

    // Exactly one broadcast per send
    assert_no_event(&mut sender).await;
    assert_no_event(&mut bystander).await;

    // The message is durable and visible over the REST API
    let (status, body) = tokio::task::spawn_blocking({
        let base_url = base_url.clone();
        move || {
            get_text(
                &base_url,
                "/messages?sender=alice@example.com&receiver=bob@example.com",
            )
        }
    })
    .await
    .expect("messages task");
    assert_eq!(status, 200);
    let messages: serde_json::Value = serde_json::from_str(&body).expect("messages json");
    let messages = messages.as_array().expect("messages array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "hi bob");

    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn conversation_history_keeps_send_order() {
    let (base_url, ws_url, shutdown_tx) = start_server().await;

    let mut alice = connect(&ws_url).await;
    let mut bob = connect(&ws_url).await;

    send_event(
        &mut alice,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "first",
            },
        }),
    )
    .await;
    // Both clients see the first message before the reply goes out
    recv_event(&mut alice).await;
    recv_event(&mut bob).await;

    send_event(
        &mut bob,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "bob@example.com",
                "receiver": "alice@example.com",
                "body": "second",
            },
        }),
    )
    .await;
    recv_event(&mut alice).await;
    recv_event(&mut bob).await;

    let (_, body) = tokio::task::spawn_blocking({
        let base_url = base_url.clone();
        move || {
            get_text(
                &base_url,
                "/messages?sender=bob@example.com&receiver=alice@example.com",
            )
        }
    })
    .await
    .expect("messages task");
    let messages: serde_json::Value = serde_json::from_str(&body).expect("messages json");
    let messages = messages.as_array().expect("messages array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["body"], "first");
    assert_eq!(messages[1]["body"], "second");

    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn unrecognized_events_are_ignored() {
    let (_base_url, ws_url, shutdown_tx) = start_server().await;

    let mut client = connect(&ws_url).await;

    send_event(
        &mut client,
        serde_json::json!({
            "event": "somethingElse",
            "data": { "sender": "a@x" },
        }),
    )
    .await;
    client
        .send(Message::Text("not even json".to_string()))
        .await
        .expect("send garbage");

    // The connection survives and the next valid event still works
    send_event(
        &mut client,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "still here",
            },
        }),
    )
    .await;

    let event = recv_event(&mut client).await;
    assert_eq!(event["event"], "receiveMessage");
    assert_eq!(event["data"]["body"], "still here");
    assert_no_event(&mut client).await;

    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn persistence_failure_drops_the_event() {
    let tmp = TempDir::new().expect("temp dir");
    let db = tmp.path().join("natter.db");
    let storage = Storage::open(&db).expect("open storage");
    let (base_url, ws_url, shutdown_tx) = start_server_with(storage).await;

    let mut sender = connect(&ws_url).await;
    let mut watcher = connect(&ws_url).await;
    wait_for_active(&base_url, 2).await;

    // Pull the table out from under the running server
    let raw = rusqlite::Connection::open(&db).expect("open raw connection");
    raw.execute_batch("ALTER TABLE messages RENAME TO messages_hidden;")
        .expect("hide table");

    send_event(
        &mut sender,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "into the void",
            },
        }),
    )
    .await;

    // The event is dropped outright: no broadcast to anyone, no error back
    // to the sender, and both connections stay registered
    assert_no_event(&mut sender).await;
    assert_no_event(&mut watcher).await;
    wait_for_active(&base_url, 2).await;

    // With the table back, the same connection sends normally
    raw.execute_batch("ALTER TABLE messages_hidden RENAME TO messages;")
        .expect("restore table");

    send_event(
        &mut sender,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "back again",
            },
        }),
    )
    .await;
    let event = recv_event(&mut sender).await;
    assert_eq!(event["data"]["body"], "back again");
    let event = recv_event(&mut watcher).await;
    assert_eq!(event["data"]["body"], "back again");

    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn broadcast_survives_a_disconnected_peer() {
    let (base_url, ws_url, shutdown_tx) = start_server().await;

    let mut survivor = connect(&ws_url).await;
    let departing = connect(&ws_url).await;
    wait_for_active(&base_url, 2).await;

    // The peer leaves before any broadcast happens
    drop(departing);
    wait_for_active(&base_url, 1).await;

    send_event(
        &mut survivor,
        serde_json::json!({
            "event": "sendMessage",
            "data": {
                "sender": "alice@example.com",
                "receiver": "bob@example.com",
                "body": "anyone there?",
            },
        }),
    )
    .await;

    let event = recv_event(&mut survivor).await;
    assert_eq!(event["event"], "receiveMessage");
    assert_eq!(event["data"]["body"], "anyone there?");

    shutdown_tx.send(()).ok();
}

#[tokio::test]
async fn health_tracks_active_connections() {
    let (base_url, ws_url, shutdown_tx) = start_server().await;

    let client_a = connect(&ws_url).await;
    let client_b = connect(&ws_url).await;
    wait_for_active(&base_url, 2).await;

    drop(client_a);
    drop(client_b);
    wait_for_active(&base_url, 0).await;

    shutdown_tx.send(()).ok();
}
