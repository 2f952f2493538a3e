//! Router construction, route handlers and the serve loop.
//!
//! # Shutdown
//!
//! [`run_server`] stops accepting when its `shutdown` future completes.  In
//! the same step it shuts the [`SessionHub`](crate::application::SessionHub)
//! down, so every upgraded session sends Close 1001 and leaves the live set
//! before the serve loop returns.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::json;
use soundeck_core::ConfigDocument;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::auth::{presented_credential, verify, AuthError, TokenQuery};
use super::rate_limit::rate_limit;
use super::session::run_session;
use super::AppState;
use crate::infrastructure::storage::ConfigError;

/// Builds the full router with tracing, CORS and rate limiting applied.
pub fn build_router(state: AppState) -> Router {
    let limited = Router::new()
        .route("/", get(root))
        .route("/config", get(get_config).put(put_config))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves `state` on `listener` until `shutdown` completes.
///
/// # Errors
///
/// Returns the I/O error that ended the serve loop.
pub async fn run_server<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("SounDeck listening on {}", listener.local_addr()?);
    let hub = Arc::clone(&state.hub);
    let app = build_router(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown.await;
            hub.shutdown().await;
        })
        .await
}

fn authorize(state: &AppState, headers: &HeaderMap, query: &TokenQuery) -> Result<(), AuthError> {
    let doc = state.store.snapshot();
    verify(doc.credential(), presented_credential(headers, query))
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SounDeck backend running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ConfigDocument>, AuthError> {
    authorize(&state, &headers, &query)?;
    Ok(Json(ConfigDocument::clone(&state.store.snapshot())))
}

async fn put_config(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    body: Result<Json<ConfigDocument>, JsonRejection>,
) -> Response {
    if let Err(e) = authorize(&state, &headers, &query) {
        warn!("config update from {peer} refused: {e}");
        return e.into_response();
    }
    let Json(doc) = match body {
        Ok(body) => body,
        Err(rejection) => return detail(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let store = Arc::clone(&state.store);
    let published = match tokio::task::spawn_blocking(move || store.replace(doc)).await {
        Ok(Ok(published)) => published,
        Ok(Err(ConfigError::Invalid(e))) => return detail(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(e)) => {
            error!("failed to persist config: {e}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "failed to persist config");
        }
        Err(e) => {
            error!("config update task failed: {e}");
            return detail(StatusCode::INTERNAL_SERVER_ERROR, "failed to persist config");
        }
    };

    let pushed = state.hub.broadcast_config().await;
    info!(
        "config replaced by {peer} ({} buttons); pushed to {pushed} sessions",
        published.buttons.len()
    );
    Json(ConfigDocument::clone(&published)).into_response()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let auth = authorize(&state, &headers, &query);
    ws.on_upgrade(move |socket| run_session(socket, peer, state, auth))
}
