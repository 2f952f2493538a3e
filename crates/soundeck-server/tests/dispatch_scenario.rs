//! End-to-end dispatch scenario: one binding, two trigger sources.
//!
//! The document binds button 1 ("Air Horn") to F5 and `airhorn.wav`.  A
//! keyboard press (scripted through `MockInputSource`) and an app tap on the
//! same running server must each play the sound exactly once, also when both
//! press at the same time; anything not bound plays nothing.
//!
//! ```text
//! MockInputSource ──▶ KeyListener ──┐
//!                                   ├──▶ Dispatcher ──▶ RecordingPlaybackGateway
//! ws client ──▶ /ws session task ───┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use soundeck_core::{ButtonBinding, ConfigDocument, RawKeyCode};
use soundeck_server::application::{Dispatcher, KeyListener, SessionHub, TriggerSink};
use soundeck_server::infrastructure::input_capture::mock::MockInputSource;
use soundeck_server::infrastructure::input_capture::RawInputEvent;
use soundeck_server::infrastructure::playback::mock::RecordingPlaybackGateway;
use soundeck_server::infrastructure::playback::PlaybackGateway;
use soundeck_server::infrastructure::storage::ConfigStore;
use soundeck_server::infrastructure::web::{run_server, AppState};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

const CREDENTIAL: &str = "00112233445566778899aabbccddeeff";
const TIMEOUT: Duration = Duration::from_secs(5);

/// F5 as the Windows hook reports it.
const VK_F5: RawKeyCode = RawKeyCode::WindowsVk(0x74);
/// F5 as an evdev device reports it.
const EVDEV_F5: RawKeyCode = RawKeyCode::LinuxEvdev(63);
/// Numpad 0 on Windows; not bound in this document.
const VK_NUMPAD0: RawKeyCode = RawKeyCode::WindowsVk(0x60);

fn air_horn_store() -> (Arc<ConfigStore>, PathBuf) {
    let dir = std::env::temp_dir().join(format!("soundeck_test_{}", Uuid::new_v4()));
    let store = ConfigStore::open(dir.join("config.json")).expect("open store");
    let mut doc = ConfigDocument {
        buttons: vec![ButtonBinding {
            id: 1,
            name: "Air Horn".to_string(),
            key: Some("f5".to_string()),
            sound: Some("airhorn.wav".to_string()),
        }],
        ..Default::default()
    };
    doc.server.credential = Some(CREDENTIAL.to_string());
    store.save(doc).expect("seed store");
    (Arc::new(store), dir)
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

/// Gives stray triggers time to show up before asserting their absence.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_air_horn_from_keyboard_and_app() {
    // Arrange: store, playback, dispatcher and key listener
    let (store, dir) = air_horn_store();
    let playback = Arc::new(RecordingPlaybackGateway::new());
    let gateway: Arc<dyn PlaybackGateway> = playback.clone();
    let dispatcher: Arc<dyn TriggerSink> =
        Arc::new(Dispatcher::new(Arc::clone(&store), gateway));

    let keyboard = MockInputSource::new();
    let listener = KeyListener::new(Box::new(keyboard.clone()), Arc::clone(&dispatcher));
    listener.start().expect("start key listener");

    // Arrange: the server on an ephemeral port
    let hub = Arc::new(SessionHub::new(Arc::clone(&store)));
    let state = AppState::new(Arc::clone(&store), Arc::clone(&hub), dispatcher);
    let tcp = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = tcp.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(run_server(tcp, state, async move {
        let _ = stop_rx.await;
    }));

    // Act 1: F5 pressed and released on the keyboard
    assert!(keyboard.tap(VK_F5));

    // Assert 1: exactly one play of the bound sound
    wait_for_plays(&playback, 1).await;
    settle().await;
    assert_eq!(playback.played(), vec!["airhorn.wav".to_string()]);

    // Act 2: the app taps button 1
    let url = format!("ws://{addr}/ws?token={CREDENTIAL}");
    let (mut ws, _) = connect_async(url).await.expect("handshake");
    let first = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .expect("initial config")
        .expect("stream open")
        .expect("transport ok");
    assert!(matches!(first, Message::Text(_)));
    ws.send(Message::Text(
        json!({ "type": "button_press", "button_id": 1 }).to_string(),
    ))
    .await
    .unwrap();

    // Assert 2: one more play
    wait_for_plays(&playback, 2).await;

    // Act 3: things that are not bound
    ws.send(Message::Text(
        json!({ "type": "button_press", "button_id": 99 }).to_string(),
    ))
    .await
    .unwrap();
    assert!(keyboard.tap(VK_NUMPAD0));
    settle().await;

    // Assert 3: nothing new played and the session is still live
    assert_eq!(playback.play_count(), 2);
    assert_eq!(hub.live_count().await, 1);

    // Cleanup: server first, then the keyboard
    let _ = stop_tx.send(());
    tokio::time::timeout(TIMEOUT, server)
        .await
        .expect("server stops")
        .expect("server task ok")
        .expect("serve loop ok");
    listener.stop();
    assert!(!keyboard.is_started());
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_keyboard_and_app_presses_at_the_same_time() {
    const PRESSES: usize = 25;

    // Arrange: one dispatcher shared by the key listener and the server
    let (store, dir) = air_horn_store();
    let playback = Arc::new(RecordingPlaybackGateway::new());
    let gateway: Arc<dyn PlaybackGateway> = playback.clone();
    let dispatcher: Arc<dyn TriggerSink> =
        Arc::new(Dispatcher::new(Arc::clone(&store), gateway));

    let keyboard = MockInputSource::new();
    let listener = KeyListener::new(Box::new(keyboard.clone()), Arc::clone(&dispatcher));
    listener.start().expect("start key listener");

    let hub = Arc::new(SessionHub::new(Arc::clone(&store)));
    let state = AppState::new(Arc::clone(&store), Arc::clone(&hub), dispatcher);
    let tcp = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = tcp.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(run_server(tcp, state, async move {
        let _ = stop_rx.await;
    }));

    let url = format!("ws://{addr}/ws?token={CREDENTIAL}");
    let (mut ws, _) = connect_async(url).await.expect("handshake");
    tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .expect("initial config")
        .expect("stream open")
        .expect("transport ok");

    // Act: the capture side and the app press concurrently
    let typist = {
        let keyboard = keyboard.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..PRESSES {
                assert!(keyboard.tap(VK_F5));
                std::thread::sleep(Duration::from_millis(2));
            }
        })
    };
    for _ in 0..PRESSES {
        ws.send(Message::Text(
            json!({ "type": "button_press", "button_id": 1 }).to_string(),
        ))
        .await
        .unwrap();
    }
    typist.await.expect("typist finished");

    // Assert: every press from both sides played once, nothing else
    wait_for_plays(&playback, 2 * PRESSES).await;
    settle().await;
    assert_eq!(playback.play_count(), 2 * PRESSES);
    assert!(playback.played().iter().all(|s| s == "airhorn.wav"));
    assert_eq!(hub.live_count().await, 1);

    let _ = stop_tx.send(());
    tokio::time::timeout(TIMEOUT, server)
        .await
        .expect("server stops")
        .expect("server task ok")
        .expect("serve loop ok");
    listener.stop();
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_evdev_and_vk_codes_for_the_same_key_play_the_same_sound() {
    // Arrange
    let (store, dir) = air_horn_store();
    let playback = Arc::new(RecordingPlaybackGateway::new());
    let gateway: Arc<dyn PlaybackGateway> = playback.clone();
    let keyboard = MockInputSource::new();
    let listener = KeyListener::new(
        Box::new(keyboard.clone()),
        Arc::new(Dispatcher::new(Arc::clone(&store), gateway)),
    );
    listener.start().expect("start key listener");

    // Act
    assert!(keyboard.tap(VK_F5));
    assert!(keyboard.tap(EVDEV_F5));

    // Assert
    wait_for_plays(&playback, 2).await;
    assert_eq!(
        playback.played(),
        vec!["airhorn.wav".to_string(), "airhorn.wav".to_string()]
    );

    listener.stop();
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_key_release_alone_plays_nothing() {
    let (store, dir) = air_horn_store();
    let playback = Arc::new(RecordingPlaybackGateway::new());
    let gateway: Arc<dyn PlaybackGateway> = playback.clone();
    let keyboard = MockInputSource::new();
    let listener = KeyListener::new(
        Box::new(keyboard.clone()),
        Arc::new(Dispatcher::new(Arc::clone(&store), gateway)),
    );
    listener.start().expect("start key listener");

    assert!(keyboard.inject_event(RawInputEvent::KeyUp { code: VK_F5 }));
    settle().await;

    assert_eq!(playback.play_count(), 0);
    listener.stop();
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_no_plays_after_listener_stops() {
    let (store, dir) = air_horn_store();
    let playback = Arc::new(RecordingPlaybackGateway::new());
    let gateway: Arc<dyn PlaybackGateway> = playback.clone();
    let keyboard = MockInputSource::new();
    let listener = KeyListener::new(
        Box::new(keyboard.clone()),
        Arc::new(Dispatcher::new(Arc::clone(&store), gateway)),
    );
    listener.start().expect("start key listener");

    listener.stop();

    // The source is stopped, so the press has nowhere to go
    assert!(!keyboard.tap(VK_F5));
    settle().await;
    assert_eq!(playback.play_count(), 0);
    let _ = std::fs::remove_dir_all(dir);
}
