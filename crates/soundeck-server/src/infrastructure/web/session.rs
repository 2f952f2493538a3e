//! Per-connection session task for the `/ws` endpoint.
//!
//! This module is responsible for:
//!
//! 1. Rejecting an unauthenticated upgrade with Close 1008 (`unauthorized`)
//!    before anything else is sent.
//! 2. Registering with the [`SessionHub`](crate::application::SessionHub) and
//!    pushing the current configuration as the first message.
//! 3. Running one loop that owns the socket and waits on three things at once:
//!    - the hub's shutdown signal → Close 1001 and exit;
//!    - the session's outbound queue → forward config broadcasts;
//!    - inbound frames → `button_press` goes to the trigger sink, any other
//!      JSON is ignored, non-JSON closes the session with 1007.
//! 4. Deregistering on the way out, whatever the reason.
//!
//! Ping/pong is answered by the transport; this loop never sees a ping it
//! has to reply to.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use soundeck_core::protocol::messages::client_message_name;
use soundeck_core::{
    decode_client_message, encode_server_message, ClientMessage, ProtocolError, ServerMessage,
    Trigger,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::auth::AuthError;
use super::AppState;
use crate::application::{Registration, SessionId, SessionState, TriggerSink};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

fn close(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }))
}

fn advance(state: &mut SessionState, next: SessionState) {
    match state.transition(next) {
        Ok(next) => *state = next,
        Err(e) => warn!("{e}"),
    }
}

/// Runs one upgraded connection from handshake result to close.
pub async fn run_session(
    socket: WebSocket,
    peer: SocketAddr,
    state: AppState,
    auth: Result<(), AuthError>,
) {
    let mut phase = SessionState::Connecting;
    let (mut sender, mut receiver) = socket.split();

    if let Err(e) = auth {
        warn!("rejected session from {peer}: {e}");
        let _ = sender.send(close(close_code::POLICY, "unauthorized")).await;
        advance(&mut phase, SessionState::Closed);
        return;
    }
    advance(&mut phase, SessionState::Authenticated);

    let mut registration = match state.hub.register(peer).await {
        Ok(registration) => registration,
        Err(e) => {
            debug!("refused session from {peer}: {e}");
            let _ = sender.send(close(close_code::AWAY, "server shutting down")).await;
            advance(&mut phase, SessionState::Closed);
            return;
        }
    };
    advance(&mut phase, SessionState::Active);

    let id = registration.id;
    drive(&mut sender, &mut receiver, &mut registration, &state).await;

    state.hub.unregister(id).await;
    advance(&mut phase, SessionState::Closed);
}

/// Completes when the hub signals shutdown (or drops the signal).
async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|stop| *stop).await;
}

async fn drive(
    sender: &mut WsSink,
    receiver: &mut WsStream,
    registration: &mut Registration,
    state: &AppState,
) {
    let id = registration.id;

    let doc = state.store.snapshot();
    let initial = match encode_server_message(&ServerMessage::Config { data: &doc }) {
        Ok(text) => text,
        Err(e) => {
            error!("session {id}: {e}");
            return;
        }
    };
    if sender.send(Message::Text(initial)).await.is_err() {
        debug!("session {id}: peer gone before initial config");
        return;
    }

    loop {
        tokio::select! {
            () = shutdown_requested(&mut registration.shutdown) => {
                let _ = sender.send(close(close_code::AWAY, "server shutting down")).await;
                break;
            }

            queued = registration.outbound.recv() => {
                let Some(text) = queued else { break };
                if sender.send(Message::Text(text)).await.is_err() {
                    debug!("session {id}: send failed (peer disconnected)");
                    break;
                }
            }

            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            info!("session {id}: binary frame is not UTF-8; closing");
                            let _ = sender.send(close(close_code::INVALID, "invalid payload")).await;
                            break;
                        }
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("session {id}: closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("session {id}: transport error: {e}");
                        break;
                    }
                };

                if let Err(e) = handle_text(id, &text, state.sink.as_ref()) {
                    info!("session {id}: {e}; closing");
                    let _ = sender.send(close(close_code::INVALID, "invalid payload")).await;
                    break;
                }
            }
        }
    }
}

/// Decodes one inbound frame and forwards button presses to `sink`.
fn handle_text(id: SessionId, text: &str, sink: &dyn TriggerSink) -> Result<(), ProtocolError> {
    let msg = decode_client_message(text)?;
    debug!("session {id}: {}", client_message_name(&msg));
    if let ClientMessage::ButtonPress { button_id } = msg {
        sink.on_trigger(Trigger::ButtonId(button_id));
    }
    Ok(())
}
