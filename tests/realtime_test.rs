//! Integration tests for the WebSocket layer: auth close codes, keepalive,
//! presence announce/overwrite/cleanup, and the typing and read-notice relays.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    db: pinboard_server::db::DbPool,
    jwt_secret: Vec<u8>,
    _tmp: tempfile::TempDir,
}

async fn start_test_server() -> TestServer {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp.path().to_str().unwrap().to_string();

    let db = pinboard_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = pinboard_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = pinboard_server::state::AppState {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        hub: Arc::new(pinboard_server::realtime::hub::Hub::new()),
    };

    let app = pinboard_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        db,
        jwt_secret,
        _tmp: tmp,
    }
}

fn seed_user(server: &TestServer, name: &str, email: &str) -> (String, String) {
    let conn = server.db.lock().unwrap();
    let user_id = pinboard_server::users::store::insert_user(&conn, name, email, None)
        .expect("Failed to insert user");
    drop(conn);
    let token = pinboard_server::auth::jwt::issue_access_token(&server.jwt_secret, &user_id)
        .expect("Failed to issue token");
    (user_id, token)
}

async fn connect(server: &TestServer, token: &str) -> WsStream {
    let ws_url = format!("ws://{}/ws?token={}", server.addr, token);
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    ws
}

async fn send_event(ws: &mut WsStream, event: Value) {
    ws.send(Message::Text(event.to_string()))
        .await
        .expect("Failed to send event");
}

async fn next_event(ws: &mut WsStream, wait: Duration) -> Option<Value> {
    loop {
        match tokio::time::timeout(wait, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(&text).expect("Invalid event JSON"));
            }
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

async fn wait_for_event(ws: &mut WsStream, event: &str) -> Value {
    for _ in 0..20 {
        if let Some(value) = next_event(ws, Duration::from_secs(2)).await {
            if value["event"] == event {
                return value["data"].clone();
            }
            continue;
        }
        break;
    }
    panic!("Timed out waiting for event {event}");
}

fn online_set(data: &Value) -> Vec<String> {
    let mut users: Vec<String> = data
        .as_array()
        .expect("updateOnlineUsers carries an array")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    users.sort();
    users
}

#[tokio::test]
async fn test_ws_rejects_invalid_token_with_close_code() {
    let server = start_test_server().await;

    let ws_url = format!("ws://{}/ws?token=not_a_jwt", server.addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket should upgrade even with an invalid token");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected close message within timeout");

    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(
                frame.code,
                tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4002),
                "Expected close code 4002 (token invalid)"
            );
        }
        Some(Ok(Message::Close(None))) => {}
        other => {
            if let Some(Ok(msg)) = other {
                assert!(msg.is_close(), "Expected close message, got: {:?}", msg);
            }
        }
    }
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let server = start_test_server().await;
    let (_user_id, token) = seed_user(&server, "PingUser", "ping@example.com");

    let mut ws = connect(&server, &token).await;

    ws.send(Message::Ping(vec![42, 43, 44]))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Expected pong within timeout");

    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_slice(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_presence_announce_and_disconnect_broadcasts() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");
    let (bob_id, bob_token) = seed_user(&server, "Bob", "bob@example.com");

    let mut alice_ws = connect(&server, &alice_token).await;
    send_event(&mut alice_ws, json!({"event": "userOnline", "data": alice_id})).await;
    let data = wait_for_event(&mut alice_ws, "updateOnlineUsers").await;
    assert_eq!(online_set(&data), vec![alice_id.clone()]);

    // Bob announces — both connections see the grown set.
    let mut bob_ws = connect(&server, &bob_token).await;
    send_event(&mut bob_ws, json!({"event": "userOnline", "data": bob_id})).await;

    let mut expected = vec![alice_id.clone(), bob_id.clone()];
    expected.sort();
    let data = wait_for_event(&mut alice_ws, "updateOnlineUsers").await;
    assert_eq!(online_set(&data), expected);
    let data = wait_for_event(&mut bob_ws, "updateOnlineUsers").await;
    assert_eq!(online_set(&data), expected);

    // Bob drops — Alice sees him leave the set.
    bob_ws.close(None).await.expect("Failed to close");
    let data = wait_for_event(&mut alice_ws, "updateOnlineUsers").await;
    assert_eq!(online_set(&data), vec![alice_id.clone()]);
}

#[tokio::test]
async fn test_connection_closed_before_announce_is_silent() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");
    let (_bob_id, bob_token) = seed_user(&server, "Bob", "bob@example.com");

    let mut alice_ws = connect(&server, &alice_token).await;
    send_event(&mut alice_ws, json!({"event": "userOnline", "data": alice_id})).await;
    wait_for_event(&mut alice_ws, "updateOnlineUsers").await;

    // Bob connects but never announces, then leaves: no presence change at all.
    let mut bob_ws = connect(&server, &bob_token).await;
    bob_ws.close(None).await.expect("Failed to close");

    assert!(
        next_event(&mut alice_ws, Duration::from_millis(400)).await.is_none(),
        "No broadcast expected for an unannounced connection closing"
    );
}

#[tokio::test]
async fn test_typing_relay_carries_sender_identity() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");
    let (bob_id, bob_token) = seed_user(&server, "Bob", "bob@example.com");

    let mut alice_ws = connect(&server, &alice_token).await;
    send_event(&mut alice_ws, json!({"event": "userOnline", "data": alice_id})).await;
    let mut bob_ws = connect(&server, &bob_token).await;
    send_event(&mut bob_ws, json!({"event": "userOnline", "data": bob_id})).await;
    wait_for_event(&mut bob_ws, "updateOnlineUsers").await;

    send_event(
        &mut alice_ws,
        json!({"event": "typing", "data": {"receiverId": bob_id, "isTyping": true}}),
    )
    .await;

    let data = wait_for_event(&mut bob_ws, "userTyping").await;
    assert_eq!(data["userId"], alice_id.as_str());
    assert_eq!(data["isTyping"], true);

    send_event(
        &mut alice_ws,
        json!({"event": "typing", "data": {"receiverId": bob_id, "isTyping": false}}),
    )
    .await;
    let data = wait_for_event(&mut bob_ws, "userTyping").await;
    assert_eq!(data["isTyping"], false);
}

#[tokio::test]
async fn test_read_notice_relays() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");
    let (bob_id, bob_token) = seed_user(&server, "Bob", "bob@example.com");

    let mut alice_ws = connect(&server, &alice_token).await;
    send_event(&mut alice_ws, json!({"event": "userOnline", "data": alice_id})).await;
    let mut bob_ws = connect(&server, &bob_token).await;
    send_event(&mut bob_ws, json!({"event": "userOnline", "data": bob_id})).await;

    // Bob tells Alice he has read her whole conversation.
    send_event(
        &mut bob_ws,
        json!({"event": "markAsRead", "data": {"senderId": alice_id, "receiverId": bob_id}}),
    )
    .await;
    let data = wait_for_event(&mut alice_ws, "messagesRead").await;
    assert_eq!(data, Value::String(bob_id.clone()));

    // And that one particular message is read.
    send_event(
        &mut bob_ws,
        json!({"event": "messageRead", "data": {"messageId": "m-123", "senderId": alice_id}}),
    )
    .await;
    let data = wait_for_event(&mut alice_ws, "messageReadUpdate").await;
    assert_eq!(data, Value::String("m-123".to_string()));
}

#[tokio::test]
async fn test_second_announce_overwrites_presence() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");

    // Two connections announce as the same user; the second owns presence.
    let mut first_ws = connect(&server, &alice_token).await;
    send_event(&mut first_ws, json!({"event": "userOnline", "data": alice_id})).await;
    wait_for_event(&mut first_ws, "updateOnlineUsers").await;

    let mut second_ws = connect(&server, &alice_token).await;
    send_event(&mut second_ws, json!({"event": "userOnline", "data": alice_id})).await;
    let data = wait_for_event(&mut second_ws, "updateOnlineUsers").await;
    assert_eq!(online_set(&data), vec![alice_id.clone()]);

    // Closing the first (overwritten) connection still purges the presence
    // entry: last-announce-wins presence keeps one entry per user, so the
    // survivor observes the user go offline.
    first_ws.close(None).await.expect("Failed to close");
    let data = wait_for_event(&mut second_ws, "updateOnlineUsers").await;
    assert!(online_set(&data).is_empty());
}

#[tokio::test]
async fn test_channel_fanout_reaches_every_joined_connection() {
    let server = start_test_server().await;
    let (alice_id, alice_token) = seed_user(&server, "Alice", "alice@example.com");
    let (bob_id, bob_token) = seed_user(&server, "Bob", "bob@example.com");

    // Bob's first connection announces; a second one joins the same personal
    // channel explicitly (the reconnect flow) without announcing.
    let mut bob_main = connect(&server, &bob_token).await;
    send_event(&mut bob_main, json!({"event": "userOnline", "data": bob_id})).await;
    let mut bob_tab = connect(&server, &bob_token).await;
    send_event(&mut bob_tab, json!({"event": "joinChat", "data": {"userId": bob_id}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut alice_ws = connect(&server, &alice_token).await;
    send_event(&mut alice_ws, json!({"event": "userOnline", "data": alice_id})).await;

    send_event(
        &mut alice_ws,
        json!({"event": "typing", "data": {"receiverId": bob_id, "isTyping": true}}),
    )
    .await;

    for ws in [&mut bob_main, &mut bob_tab] {
        let data = wait_for_event(ws, "userTyping").await;
        assert_eq!(data["userId"], alice_id.as_str());
    }

    // After an explicit leave, the second connection stops hearing the channel.
    send_event(&mut bob_tab, json!({"event": "leaveChat", "data": {"userId": bob_id}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    send_event(
        &mut alice_ws,
        json!({"event": "typing", "data": {"receiverId": bob_id, "isTyping": false}}),
    )
    .await;

    let data = wait_for_event(&mut bob_main, "userTyping").await;
    assert_eq!(data["isTyping"], false);
    assert!(
        next_event(&mut bob_tab, Duration::from_millis(400)).await.is_none(),
        "Left connection must not receive channel events"
    );
}
