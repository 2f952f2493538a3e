//! SounDeck server entry point.
//!
//! Turns numeric-pad and F5–F8 key presses on this machine, and button taps
//! in the SounDeck app, into sound playback.
//!
//! # Usage
//!
//! ```text
//! soundeck [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Configuration document [default: platform config dir]
//!   --host <IP>           Bind address [default: document's server.host]
//!   --port <PORT>         Bind port [default: document's server.port]
//!   --headless            Log at warn level unless RUST_LOG says otherwise
//!   --no-keyboard         Do not capture hardware keys
//!   --player <PROGRAM>    Sound player program [default: aplay / afplay / PowerShell]
//!   --player-arg <ARG>    Argument for --player; `{file}` marks the file position
//!   --sounds-dir <DIR>    Base directory for relative sound paths
//!                         [default: directory of the config file]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable               | Flag            |
//! |------------------------|-----------------|
//! | `SOUNDECK_CONFIG`      | `--config`      |
//! | `SOUNDECK_HOST`        | `--host`        |
//! | `SOUNDECK_PORT`        | `--port`        |
//! | `SOUNDECK_HEADLESS`    | `--headless`    |
//! | `SOUNDECK_NO_KEYBOARD` | `--no-keyboard` |
//! | `SOUNDECK_PLAYER`      | `--player`      |
//! | `SOUNDECK_PLAYER_ARGS` | `--player-arg` (space separated) |
//! | `SOUNDECK_SOUNDS_DIR`  | `--sounds-dir`  |
//!
//! # Architecture overview
//!
//! ```text
//! keyboard ──▶ KeyListener ──┐
//!                            ├──▶ Dispatcher ──▶ resolver ──▶ PlaybackGateway
//! app (/ws) ─▶ session task ─┘         ▲
//!                  │                   │
//!              SessionHub ◀── ConfigStore ◀── PUT /config
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use soundeck_core::ConfigDocument;
use soundeck_server::application::{Dispatcher, KeyListener, SessionHub, TriggerSink};
use soundeck_server::infrastructure::input_capture::platform_input_source;
use soundeck_server::infrastructure::playback::{CommandPlaybackGateway, PlayerCommand};
use soundeck_server::infrastructure::storage::{default_config_path, ConfigStore};
use soundeck_server::infrastructure::web::{run_server, AppState};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SounDeck sound-trigger server.
#[derive(Debug, Parser)]
#[command(
    name = "soundeck",
    about = "Plays sounds on numeric-pad key presses and SounDeck app button taps",
    version
)]
struct Cli {
    /// Path of the JSON configuration document.
    #[arg(long, env = "SOUNDECK_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind to; overrides `server.host` in the document.
    #[arg(long, env = "SOUNDECK_HOST")]
    host: Option<String>,

    /// TCP port to listen on; overrides `server.port` in the document.
    #[arg(long, env = "SOUNDECK_PORT")]
    port: Option<u16>,

    /// Quieter logging for unattended hosts (also `server.headless`).
    #[arg(long, env = "SOUNDECK_HEADLESS")]
    headless: bool,

    /// Skip hardware key capture entirely.
    #[arg(long, env = "SOUNDECK_NO_KEYBOARD")]
    no_keyboard: bool,

    /// Program used to play a sound file.
    #[arg(long, env = "SOUNDECK_PLAYER")]
    player: Option<String>,

    /// Argument passed to `--player`; repeat for several.
    #[arg(
        long = "player-arg",
        env = "SOUNDECK_PLAYER_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true
    )]
    player_args: Vec<String>,

    /// Directory relative sound references resolve against.
    #[arg(long, env = "SOUNDECK_SOUNDS_DIR")]
    sounds_dir: Option<PathBuf>,
}

/// Effective settings after merging the CLI over the document.
#[derive(Debug)]
struct RuntimeSettings {
    bind_addr: SocketAddr,
    headless: bool,
    keyboard: bool,
    player: PlayerCommand,
    sounds_dir: PathBuf,
    audio_device: String,
}

impl Cli {
    /// The `--config` path, or the platform default.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => default_config_path().context("cannot locate the configuration file; pass --config"),
        }
    }

    /// Merges the CLI over the document's `server` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the effective host is not an IP address.
    fn into_runtime_settings(
        self,
        doc: &ConfigDocument,
        config_dir: PathBuf,
    ) -> anyhow::Result<RuntimeSettings> {
        let host = self.host.unwrap_or_else(|| doc.server.host.clone());
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("invalid bind address: '{host}'"))?;
        let port = self.port.unwrap_or(doc.server.port);

        let player = match self.player {
            Some(program) => PlayerCommand::new(program, self.player_args),
            None => PlayerCommand::platform_default(),
        };

        Ok(RuntimeSettings {
            bind_addr: SocketAddr::new(ip, port),
            headless: self.headless || doc.server.headless,
            keyboard: !self.no_keyboard,
            player,
            sounds_dir: self.sounds_dir.unwrap_or(config_dir),
            audio_device: doc.server.audio_device.clone(),
        })
    }
}

fn init_logging(headless: bool) {
    let default_level = if headless { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; shutting down"),
        Err(e) => {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and the configuration document is loaded;
///    an unreadable or malformed document aborts here.
/// 2. Logging is initialised (`warn` when headless, otherwise `info`;
///    `RUST_LOG` overrides both).
/// 3. An access credential is generated and saved if the document has none.
/// 4. The dispatcher, session hub and (unless `--no-keyboard`) key listener
///    are wired together.
/// 5. The HTTP/WebSocket server runs until Ctrl+C, then sessions are closed
///    and the key listener is stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;
    let store = Arc::new(
        ConfigStore::open(config_path.clone())
            .with_context(|| format!("failed to load {}", config_path.display()))?,
    );

    let doc = store.snapshot();
    let settings = cli.into_runtime_settings(&doc, store.base_dir())?;
    init_logging(settings.headless);

    info!(
        "SounDeck {} starting; config {} ({} buttons)",
        env!("CARGO_PKG_VERSION"),
        config_path.display(),
        doc.buttons.len()
    );
    if let Err(e) = doc.validate() {
        warn!("{e}; the first matching button wins");
    }

    store
        .ensure_credential()
        .context("failed to store the access credential")?;
    info!("app credential is server.credential in {}", config_path.display());

    // ── Dispatch ──────────────────────────────────────────────────────────────
    let playback = CommandPlaybackGateway::new(settings.sounds_dir.clone(), settings.player.clone())
        .with_audio_device(&settings.audio_device);
    info!(
        "playing with {} from {} (audio device: {})",
        settings.player.program,
        settings.sounds_dir.display(),
        settings.audio_device
    );
    let dispatcher: Arc<dyn TriggerSink> =
        Arc::new(Dispatcher::new(Arc::clone(&store), Arc::new(playback)));

    // ── Hardware keys ─────────────────────────────────────────────────────────
    let key_listener = if settings.keyboard {
        let source = platform_input_source().context("keyboard capture unavailable; use --no-keyboard")?;
        let listener = KeyListener::new(source, Arc::clone(&dispatcher));
        listener
            .start()
            .context("failed to start keyboard capture; use --no-keyboard to run without it")?;
        Some(listener)
    } else {
        info!("keyboard capture disabled");
        None
    };

    // ── Server ────────────────────────────────────────────────────────────────
    let hub = Arc::new(SessionHub::new(Arc::clone(&store)));
    let state = AppState::new(Arc::clone(&store), hub, dispatcher);
    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    run_server(listener, state, shutdown_signal())
        .await
        .context("server error")?;

    if let Some(listener) = key_listener {
        listener.stop();
    }
    info!("SounDeck stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
