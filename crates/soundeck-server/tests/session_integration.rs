//! Integration tests for app sessions on `/ws`.
//!
//! # Purpose
//!
//! These tests start the real server on an ephemeral loopback port and talk
//! to it with a `tokio-tungstenite` client, the same way the SounDeck app
//! does.  They verify:
//!
//! - A wrong credential is answered with Close 1008 and never joins the live set.
//! - The first message of an accepted session is the current configuration.
//! - `button_press` reaches playback; unknown ids and bindings with an empty
//!   sound play nothing and leave the session open; non-JSON closes the
//!   session with 1007.
//! - One client disconnecting does not disturb the others.
//! - A configuration replaced through `PUT /config` is pushed to every session.
//! - Server shutdown closes every session with 1001 within the grace period.
//!
//! # Session lifecycle
//!
//! ```text
//! Client                                  Server
//! ──────                                  ──────
//! GET /ws?token=…  ──────────────────▶   auth check
//!                  ◀──────────────────   Close 1008            (bad token)
//!                  ◀──────────────────   {"type":"config",…}   (accepted)
//! {"type":"button_press",…} ─────────▶   dispatch
//!                  ◀──────────────────   {"type":"config",…}   (after PUT /config)
//!                  ◀──────────────────   Close 1001            (shutdown)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use soundeck_core::{ButtonBinding, ConfigDocument};
use soundeck_server::application::{Dispatcher, SessionHub};
use soundeck_server::infrastructure::playback::mock::RecordingPlaybackGateway;
use soundeck_server::infrastructure::playback::PlaybackGateway;
use soundeck_server::infrastructure::storage::ConfigStore;
use soundeck_server::infrastructure::web::{build_router, run_server, AppState};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;
use uuid::Uuid;

const CREDENTIAL: &str = "fedcba9876543210fedcba9876543210";
const TIMEOUT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Test server ───────────────────────────────────────────────────────────────

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    hub: Arc<SessionHub>,
    store: Arc<ConfigStore>,
    playback: Arc<RecordingPlaybackGateway>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
    dir: PathBuf,
}

impl TestServer {
    async fn start() -> Self {
        let dir = std::env::temp_dir().join(format!("soundeck_test_{}", Uuid::new_v4()));
        let store = Arc::new(ConfigStore::open(dir.join("config.json")).expect("open store"));
        let mut doc = ConfigDocument {
            buttons: vec![
                ButtonBinding {
                    id: 1,
                    name: "Air Horn".to_string(),
                    key: Some("f5".to_string()),
                    sound: Some("airhorn.wav".to_string()),
                },
                ButtonBinding {
                    id: 3,
                    name: "Not yet assigned".to_string(),
                    key: None,
                    sound: Some(String::new()),
                },
            ],
            ..Default::default()
        };
        doc.server.credential = Some(CREDENTIAL.to_string());
        store.save(doc).expect("seed store");

        let playback = Arc::new(RecordingPlaybackGateway::new());
        let gateway: Arc<dyn PlaybackGateway> = playback.clone();
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), gateway));
        let hub = Arc::new(SessionHub::new(Arc::clone(&store)));
        let state = AppState::new(Arc::clone(&store), Arc::clone(&hub), dispatcher);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_server(listener, state.clone(), async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            state,
            hub,
            store,
            playback,
            shutdown: Some(tx),
            handle,
            dir,
        }
    }

    async fn connect(&self, token: &str) -> Client {
        let url = format!("ws://{}/ws?token={token}", self.addr);
        let (ws, _response) = connect_async(url).await.expect("websocket handshake");
        ws
    }

    /// Connects and consumes the initial config message.
    async fn connect_active(&self) -> Client {
        let mut ws = self.connect(CREDENTIAL).await;
        let first = next_json(&mut ws).await;
        assert_eq!(first["type"], "config");
        ws
    }

    /// `PUT /config` through the same shared state the live server uses.
    async fn put_config(&self, body: Value) -> StatusCode {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/config")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {CREDENTIAL}"))
            .body(Body::from(body.to_string()))
            .unwrap();
        build_router(self.state.clone())
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(TIMEOUT, &mut self.handle)
            .await
            .expect("server stops within the timeout")
            .expect("server task does not panic");
        assert!(result.is_ok(), "serve loop error: {result:?}");
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Next frame, skipping pings and pongs.
async fn next_message(ws: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("frame within the timeout")
            .expect("stream not ended")
            .expect("transport ok");
        match frame {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_json(ws: &mut Client) -> Value {
    match next_message(ws).await {
        Message::Text(text) => serde_json::from_str(&text).expect("text frame is JSON"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn expect_close(ws: &mut Client) -> (u16, String) {
    match next_message(ws).await {
        Message::Close(Some(frame)) => (u16::from(frame.code), frame.reason.to_string()),
        other => panic!("expected a close frame, got {other:?}"),
    }
}

async fn wait_for_live_count(hub: &SessionHub, expected: usize) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while hub.live_count().await != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "live count never reached {expected}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_plays(playback: &RecordingPlaybackGateway, expected: usize) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while playback.play_count() < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {expected} plays, saw {:?}",
            playback.played()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn button_press(id: i64) -> Message {
    Message::Text(json!({ "type": "button_press", "button_id": id }).to_string())
}

// ── Authentication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_credential_is_closed_with_1008() {
    // Arrange
    let server = TestServer::start().await;

    // Act
    let mut ws = server.connect("wrong-credential").await;

    // Assert: close before any config, and never counted as live
    let (code, reason) = expect_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "unauthorized");
    assert_eq!(server.hub.live_count().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_missing_credential_is_closed_with_1008() {
    let server = TestServer::start().await;
    let url = format!("ws://{}/ws", server.addr);

    let (mut ws, _) = connect_async(url).await.expect("handshake");

    assert_eq!(expect_close(&mut ws).await.0, 1008);
    server.stop().await;
}

// ── Session behaviour ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_message_is_current_config() {
    // Arrange
    let server = TestServer::start().await;
    let expected = serde_json::to_value(&*server.store.snapshot()).unwrap();

    // Act
    let mut ws = server.connect(CREDENTIAL).await;
    let first = next_json(&mut ws).await;

    // Assert
    assert_eq!(first["type"], "config");
    assert_eq!(first["data"], expected);
    assert_eq!(server.hub.live_count().await, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_button_press_plays_bound_sound() {
    let server = TestServer::start().await;
    let mut ws = server.connect_active().await;

    ws.send(button_press(1)).await.unwrap();

    wait_for_plays(&server.playback, 1).await;
    assert_eq!(server.playback.played(), vec!["airhorn.wav".to_string()]);
    server.stop().await;
}

#[tokio::test]
async fn test_unbound_button_and_unknown_messages_keep_session_open() {
    // Arrange
    let server = TestServer::start().await;
    let mut ws = server.connect_active().await;

    // Act: an id nobody owns, then a message type the server does not know
    ws.send(button_press(99)).await.unwrap();
    ws.send(Message::Text(r#"{"type":"hello","from":"app"}"#.to_string()))
        .await
        .unwrap();
    // A bound press after them proves both were consumed in order
    ws.send(button_press(1)).await.unwrap();
    wait_for_plays(&server.playback, 1).await;

    // Assert: only the bound press played and the session still receives pushes
    assert_eq!(server.playback.played(), vec!["airhorn.wav".to_string()]);
    assert_eq!(server.hub.broadcast_config().await, 1);
    assert_eq!(next_json(&mut ws).await["type"], "config");

    server.stop().await;
}

#[tokio::test]
async fn test_press_of_binding_with_empty_sound_plays_nothing() {
    // Arrange: button 3 exists but has "sound": ""
    let server = TestServer::start().await;
    let mut ws = server.connect_active().await;

    // Act
    ws.send(button_press(3)).await.unwrap();
    ws.send(button_press(1)).await.unwrap();
    wait_for_plays(&server.playback, 1).await;

    // Assert: only button 1 played and the session is still live
    assert_eq!(server.playback.played(), vec!["airhorn.wav".to_string()]);
    assert_eq!(server.hub.live_count().await, 1);
    assert_eq!(server.hub.broadcast_config().await, 1);
    assert_eq!(next_json(&mut ws).await["type"], "config");

    server.stop().await;
}

#[tokio::test]
async fn test_non_json_text_closes_with_1007() {
    let server = TestServer::start().await;
    let mut ws = server.connect_active().await;

    ws.send(Message::Text("press button one".to_string()))
        .await
        .unwrap();

    let (code, _) = expect_close(&mut ws).await;
    assert_eq!(code, 1007);
    wait_for_live_count(&server.hub, 0).await;
    assert_eq!(server.playback.play_count(), 0);
    server.stop().await;
}

#[tokio::test]
async fn test_binary_json_frame_is_accepted() {
    let server = TestServer::start().await;
    let mut ws = server.connect_active().await;

    let payload = json!({ "type": "button_press", "button_id": 1 }).to_string();
    ws.send(Message::Binary(payload.into_bytes())).await.unwrap();

    wait_for_plays(&server.playback, 1).await;
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_leaves_other_sessions_untouched() {
    // Arrange: two app sessions
    let server = TestServer::start().await;
    let mut first = server.connect_active().await;
    let mut second = server.connect_active().await;
    assert_eq!(server.hub.live_count().await, 2);

    // Act: the first one goes away
    first.close(None).await.unwrap();
    wait_for_live_count(&server.hub, 1).await;

    // Assert: the second still gets pushes and can press buttons
    assert_eq!(server.hub.broadcast_config().await, 1);
    assert_eq!(next_json(&mut second).await["type"], "config");
    second.send(button_press(1)).await.unwrap();
    wait_for_plays(&server.playback, 1).await;

    server.stop().await;
}

#[tokio::test]
async fn test_put_config_is_pushed_to_every_session() {
    // Arrange
    let server = TestServer::start().await;
    let mut first = server.connect_active().await;
    let mut second = server.connect_active().await;

    // Act
    let status = server
        .put_config(json!({
            "buttons": [{ "id": 2, "name": "Rimshot", "key": "f6", "sound": "rimshot.wav" }]
        }))
        .await;

    // Assert: both sessions see the new document, credential included
    assert_eq!(status, StatusCode::OK);
    for ws in [&mut first, &mut second] {
        let pushed = next_json(ws).await;
        assert_eq!(pushed["type"], "config");
        assert_eq!(pushed["data"]["buttons"][0]["sound"], "rimshot.wav");
        assert_eq!(pushed["data"]["server"]["credential"], CREDENTIAL);
    }

    // Assert: the pushed bindings are the ones dispatch now uses
    first.send(button_press(2)).await.unwrap();
    wait_for_plays(&server.playback, 1).await;
    assert_eq!(server.playback.played(), vec!["rimshot.wav".to_string()]);

    server.stop().await;
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_closes_sessions_with_1001() {
    // Arrange
    let server = TestServer::start().await;
    let mut first = server.connect_active().await;
    let mut second = server.connect_active().await;
    let hub = Arc::clone(&server.hub);

    // Act
    server.stop().await;

    // Assert
    for ws in [&mut first, &mut second] {
        let (code, _) = expect_close(ws).await;
        assert_eq!(code, 1001);
    }
    assert_eq!(hub.live_count().await, 0);
    assert!(hub.is_shutting_down());
}
