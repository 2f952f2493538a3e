//! Per-client-IP rate limiting for the HTTP routes.
//!
//! A keyed `governor` limiter (GCRA, equivalent to a token bucket) allows a
//! burst of [`DEFAULT_BURST`] requests per IP, replenished at
//! [`DEFAULT_PER_SECOND`] per second.  A refused request gets 429.  Keys whose
//! state has fully replenished carry nothing worth keeping and are dropped
//! with `retain_recent` once more than [`PRUNE_THRESHOLD`] IPs are tracked.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::debug;

use super::AppState;

pub const DEFAULT_BURST: u32 = 10;
pub const DEFAULT_PER_SECOND: u32 = 5;

/// Number of tracked IPs above which idle keys are pruned on the next check.
pub const PRUNE_THRESHOLD: usize = 1024;

/// Rate limiter keyed by client IP.
pub struct RateLimiter {
    inner: DefaultKeyedRateLimiter<IpAddr>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked", &self.tracked())
            .finish()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        let per_second = NonZeroU32::new(DEFAULT_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(DEFAULT_BURST).unwrap_or(NonZeroU32::MIN);
        Self::new(Quota::per_second(per_second).allow_burst(burst))
    }
}

impl RateLimiter {
    pub fn new(quota: Quota) -> Self {
        Self {
            inner: governor::RateLimiter::keyed(quota),
        }
    }

    /// Spends one request for `ip`; `false` means the request must be refused.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.inner.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        self.inner.check_key(&ip).is_ok()
    }

    fn prune(&self) {
        let before = self.inner.len();
        self.inner.retain_recent();
        self.inner.shrink_to_fit();
        debug!(
            "rate limiter pruned {} idle clients",
            before.saturating_sub(self.inner.len())
        );
    }

    /// Number of tracked client IPs.
    pub fn tracked(&self) -> usize {
        self.inner.len()
    }
}

/// Middleware refusing requests from IPs that exhausted their quota.
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.limiter.check(peer.ip()) {
        debug!("rate limited {}", peer.ip());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "detail": "too many requests" })),
        )
            .into_response();
    }
    next.run(request).await
}
