//! JSON message types for the app-facing session protocol.
//!
//! Every message is a JSON object with a `"type"` discriminant:
//!
//! ```text
//! Server → App:  {"type":"config","data":{...document...}}
//! App → Server:  {"type":"button_press","button_id":3}
//! ```
//!
//! The vocabulary is deliberately fixed.  Inbound decoding is lenient: any
//! well-formed JSON value that is not a recognised command decodes to
//! [`ClientMessage::Ignored`], so newer apps can send fields or message types
//! this server does not know about without losing their session.  Only text
//! that is not JSON at all is a [`ProtocolError`].

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::document::ConfigDocument;

/// Errors raised while encoding or decoding session frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not parseable JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// An outbound message could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[source] serde_json::Error),
}

// ── Server → App ──────────────────────────────────────────────────────────────

/// Messages the server pushes to a connected app.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// Full configuration snapshot; sent once on connect and after every
    /// administrative update.
    Config { data: &'a ConfigDocument },
}

/// Serializes a server message to the text of one WebSocket frame.
///
/// # Errors
///
/// [`ProtocolError::Serialize`] if serde rejects the document.
pub fn encode_server_message(msg: &ServerMessage<'_>) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Serialize)
}

// ── App → Server ──────────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// The app pressed a button.
    ButtonPress { button_id: i64 },
    /// Valid JSON with an unknown or incomplete shape.
    Ignored,
}

/// Decodes the text of one inbound frame.
///
/// # Errors
///
/// [`ProtocolError::Malformed`] when `text` is not JSON.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

    let Some(obj) = value.as_object() else {
        return Ok(ClientMessage::Ignored);
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("button_press") => Ok(obj
            .get("button_id")
            .and_then(Value::as_i64)
            .map_or(ClientMessage::Ignored, |button_id| ClientMessage::ButtonPress { button_id })),
        _ => Ok(ClientMessage::Ignored),
    }
}

/// Short name of a decoded message for log lines.
pub fn client_message_name(msg: &ClientMessage) -> &'static str {
    match msg {
        ClientMessage::ButtonPress { .. } => "button_press",
        ClientMessage::Ignored => "ignored",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
