//! The SounDeck configuration document.
//!
//! One JSON file holds everything the server needs: the ordered list of
//! button bindings shown in the app, and the `server` settings block. Example:
//!
//! ```json
//! {
//!   "buttons": [
//!     { "id": 1, "name": "Air Horn", "key": "f5", "sound": "sounds/airhorn.wav" }
//!   ],
//!   "server": { "host": "0.0.0.0", "port": 8000, "headless": false,
//!               "audio_device": "Default" }
//! }
//! ```
//!
//! # Serde default values
//!
//! Every field outside a binding's `id` has a default, so a file written by an
//! older editor (or an empty `{}`) still loads.
//!
//! # The `backend` block
//!
//! The desktop editor reads and writes its settings under `backend` and only
//! ever touches `audio_device` there.  Both blocks may appear in one file:
//!
//! - on read, `server` is parsed first and every setting also present in
//!   `backend` overrides it (`backend` wins);
//! - on write, `server` carries the merged settings, and a `backend` block that
//!   was read is written back with its settings synced to the merged values.
//!   `audio_device` is always present in it.  A credential in `backend` is
//!   only used when `server` has none, and is never written there.
//!
//! Top-level fields this crate does not know about are kept in
//! [`ConfigDocument::extra`] so a load → save round trip never drops data that
//! another tool put in the file.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a document was rejected by [`ConfigDocument::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two bindings share the same `id`.
    #[error("duplicate button id {0}")]
    DuplicateId(i64),

    /// Two bindings share the same non-empty `key`.
    #[error("key {key:?} is bound to both button {first} and button {second}")]
    DuplicateKey { key: String, first: i64, second: i64 },
}

// ── Document schema ───────────────────────────────────────────────────────────

/// Root of the persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument", into = "RawDocument")]
pub struct ConfigDocument {
    /// Bindings in display order.  Never absent: defaults to an empty list.
    pub buttons: Vec<ButtonBinding>,

    /// Server settings, merged from `server` and `backend`.
    pub server: ServerSettings,

    /// The editor's `backend` block as read; `None` when the file had none.
    pub backend: Option<serde_json::Map<String, serde_json::Value>>,

    /// Unrecognised top-level fields, preserved verbatim.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Settings the editor's `backend` block may override.
const BACKEND_SETTINGS: [&str; 4] = ["host", "port", "headless", "audio_device"];

/// On-disk shape of [`ConfigDocument`].
#[derive(Serialize, Deserialize)]
struct RawDocument {
    #[serde(default)]
    buttons: Vec<ButtonBinding>,
    #[serde(default)]
    server: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend: Option<JsonMap>,
    #[serde(flatten)]
    extra: JsonMap,
}

impl TryFrom<RawDocument> for ConfigDocument {
    type Error = serde_json::Error;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let mut merged = raw.server.unwrap_or_default();
        if let Some(backend) = &raw.backend {
            for name in BACKEND_SETTINGS {
                if let Some(value) = backend.get(name) {
                    merged.insert(name.to_string(), value.clone());
                }
            }
            if let Some(credential) = backend.get("credential") {
                merged
                    .entry("credential")
                    .or_insert_with(|| credential.clone());
            }
        }
        let server = serde_json::from_value(serde_json::Value::Object(merged))?;

        Ok(Self {
            buttons: raw.buttons,
            server,
            backend: raw.backend,
            extra: raw.extra,
        })
    }
}

impl From<ConfigDocument> for RawDocument {
    fn from(doc: ConfigDocument) -> Self {
        let server = match serde_json::to_value(&doc.server) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => JsonMap::new(),
        };

        let backend = doc.backend.map(|mut block| {
            for name in BACKEND_SETTINGS {
                if name == "audio_device" || block.contains_key(name) {
                    if let Some(value) = server.get(name) {
                        block.insert(name.to_string(), value.clone());
                    }
                }
            }
            block
        });

        Self {
            buttons: doc.buttons,
            server: Some(server),
            backend,
            extra: doc.extra,
        }
    }
}

/// One button: a display name, an optional hardware key, an optional sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Logical key name (e.g. `"num_3"`, `"f7"`).  Absent or empty means the
    /// binding can only be fired by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Sound reference handed to playback.  Absent or empty means the
    /// binding is inert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// The `server` block of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// IP address to bind the HTTP/WebSocket listener to.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Quieter logging (warn level) for unattended hosts.
    #[serde(default)]
    pub headless: bool,
    /// Shared secret required by every authenticated endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Output device name passed through to the player.
    #[serde(default = "default_audio_device")]
    pub audio_device: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

/// Name of the audio device meaning "whatever the OS picks".
pub const DEFAULT_AUDIO_DEVICE: &str = "Default";

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_audio_device() -> String {
    DEFAULT_AUDIO_DEVICE.to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            headless: false,
            credential: None,
            audio_device: default_audio_device(),
        }
    }
}

// ── Behaviour ─────────────────────────────────────────────────────────────────

impl ButtonBinding {
    /// The bound key, treating `""` the same as absent.
    pub fn key_name(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// The bound sound, treating `""` the same as absent.
    pub fn sound_ref(&self) -> Option<&str> {
        self.sound.as_deref().filter(|s| !s.is_empty())
    }
}

impl ConfigDocument {
    /// Returns the stored credential when one is set and non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.server.credential.as_deref().filter(|c| !c.is_empty())
    }

    /// Checks the uniqueness rules for ids and non-empty keys.
    ///
    /// Returns the first violation in sequence order.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DuplicateId`] or [`ValidationError::DuplicateKey`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut ids = HashSet::new();
        let mut keys: Vec<(&str, i64)> = Vec::new();

        for button in &self.buttons {
            if !ids.insert(button.id) {
                return Err(ValidationError::DuplicateId(button.id));
            }
            if let Some(key) = button.key_name() {
                if let Some(&(_, first)) = keys.iter().find(|(k, _)| *k == key) {
                    return Err(ValidationError::DuplicateKey {
                        key: key.to_string(),
                        first,
                        second: button.id,
                    });
                }
                keys.push((key, button.id));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
