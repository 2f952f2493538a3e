//! SessionHub: the live set of authenticated app sessions.
//!
//! Each WebSocket connection runs its own task (see
//! `infrastructure::web::session`).  Once authenticated, that task registers
//! with the hub and receives:
//!
//! - a bounded **outbound queue** the hub pushes configuration snapshots into;
//! - a **shutdown signal** (`tokio::sync::watch`) that tells it to close with
//!   1001 and deregister.
//!
//! The hub never writes to a socket itself.  Broadcasting is a non-blocking
//! `try_send` into every queue, so a slow or dead session can only lose its
//! own messages.
//!
//! # Session states
//!
//! ```text
//! Connecting ──auth ok──▶ Authenticated ──registered──▶ Active ──▶ Closed
//!      │                        │
//!      └──────auth failed───────┴──────────────────────────────▶ Closed
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use soundeck_core::{encode_server_message, ServerMessage};
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use crate::infrastructure::storage::ConfigStore;

/// Monotonically assigned session identifier.
pub type SessionId = u64;

/// Capacity of each session's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 16;

/// Upper bound on how long [`SessionHub::shutdown`] waits for sessions.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Error type for session lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The hub is shutting down and accepts no new sessions.
    #[error("server is shutting down")]
    ShuttingDown,

    /// A state change the session state machine does not allow.
    #[error("illegal session transition {from:?} -> {to:?}")]
    IllegalTransition { from: SessionState, to: SessionState },
}

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

impl SessionState {
    /// Returns `next` when the move from `self` is allowed.
    ///
    /// # Errors
    ///
    /// [`SessionError::IllegalTransition`] otherwise.
    pub fn transition(self, next: SessionState) -> Result<SessionState, SessionError> {
        use SessionState::*;
        match (self, next) {
            (Connecting, Authenticated)
            | (Connecting, Closed)
            | (Authenticated, Active)
            | (Authenticated, Closed)
            | (Active, Closed) => Ok(next),
            (from, to) => Err(SessionError::IllegalTransition { from, to }),
        }
    }
}

/// The hub's view of one live session.
#[derive(Debug)]
pub struct SessionHandle {
    pub peer: SocketAddr,
    pub created_at: Instant,
    outbound: mpsc::Sender<String>,
}

/// What a session task receives when it registers.
#[derive(Debug)]
pub struct Registration {
    pub id: SessionId,
    /// Messages the hub wants delivered to this session's socket.
    pub outbound: mpsc::Receiver<String>,
    /// Becomes `true` when the hub shuts down.
    pub shutdown: watch::Receiver<bool>,
}

/// Tracks authenticated sessions and fans configuration out to them.
pub struct SessionHub {
    store: Arc<ConfigStore>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionHub {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Adds a session to the live set.
    ///
    /// # Errors
    ///
    /// [`SessionError::ShuttingDown`] once [`SessionHub::shutdown`] has begun.
    pub async fn register(&self, peer: SocketAddr) -> Result<Registration, SessionError> {
        let mut sessions = self.sessions.write().await;
        if self.is_shutting_down() {
            return Err(SessionError::ShuttingDown);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        sessions.insert(
            id,
            SessionHandle {
                peer,
                created_at: Instant::now(),
                outbound: outbound_tx,
            },
        );
        info!("session {id} ({peer}) registered; {} live", sessions.len());

        Ok(Registration {
            id,
            outbound: outbound_rx,
            shutdown: self.shutdown_tx.subscribe(),
        })
    }

    /// Removes a session; returns whether it was present.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(&id) {
            Some(handle) => {
                info!(
                    "session {id} ({}) closed after {:?}; {} live",
                    handle.peer,
                    handle.created_at.elapsed(),
                    sessions.len()
                );
                true
            }
            None => false,
        }
    }

    /// Number of sessions in the live set.
    pub async fn live_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether `id` is in the live set.
    pub async fn is_live(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Pushes the current snapshot to every live session.
    ///
    /// Returns how many sessions accepted the message into their queue.
    pub async fn broadcast_config(&self) -> usize {
        let doc = self.store.snapshot();
        let text = match encode_server_message(&ServerMessage::Config { data: &doc }) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot broadcast config: {e}");
                return 0;
            }
        };

        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        for (id, handle) in sessions.iter() {
            match handle.outbound.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("session {id}: outbound queue full; config push dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("session {id}: outbound queue closed");
                }
            }
        }
        debug!("config broadcast to {delivered}/{} sessions", sessions.len());
        delivered
    }

    /// Whether [`SessionHub::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Refuses new sessions, signals live ones to close, and waits up to
    /// [`SHUTDOWN_GRACE`] for the live set to drain.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let live = self.live_count().await;
        info!("session hub shutting down; {live} live sessions");

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.live_count().await > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "{} sessions still open after {:?}",
                    self.live_count().await,
                    SHUTDOWN_GRACE
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        debug!("all sessions drained");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
