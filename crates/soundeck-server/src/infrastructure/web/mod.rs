//! HTTP and WebSocket surface of the SounDeck server.
//!
//! One axum [`Router`](axum::Router) serves everything on a single port:
//!
//! | Route          | Auth | Purpose                                   |
//! |----------------|------|-------------------------------------------|
//! | `GET /`        | no   | Liveness probe                            |
//! | `GET /config`  | yes  | Current configuration snapshot            |
//! | `PUT /config`  | yes  | Replace the configuration and broadcast it |
//! | `GET /ws`      | yes  | Persistent app session                    |
//!
//! `/` and `/config` are rate limited per client IP.

pub mod auth;
pub mod rate_limit;
pub mod server;
pub mod session;

use std::sync::Arc;

use crate::application::{SessionHub, TriggerSink};
use crate::infrastructure::storage::ConfigStore;

pub use rate_limit::RateLimiter;
pub use server::{build_router, run_server};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub hub: Arc<SessionHub>,
    /// Where app button presses go.
    pub sink: Arc<dyn TriggerSink>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State with the default rate limits.
    pub fn new(store: Arc<ConfigStore>, hub: Arc<SessionHub>, sink: Arc<dyn TriggerSink>) -> Self {
        Self {
            store,
            hub,
            sink,
            limiter: Arc::new(RateLimiter::default()),
        }
    }

    /// Replaces the rate limiter.
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }
}
