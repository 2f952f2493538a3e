//! # soundeck-core
//!
//! Shared library for SounDeck containing the configuration document model,
//! trigger resolution, platform key-code tables, and the JSON wire messages
//! spoken with the remote app.
//!
//! It has zero dependencies on OS APIs, sockets, or audio devices, which keeps
//! every piece of business logic here unit-testable without a running server.
//!
//! # Architecture overview
//!
//! SounDeck is a soundboard server: a numeric pad (or the phone app) fires a
//! *trigger*, the server looks up which sound the trigger is bound to, and the
//! sound is played on the host.
//!
//! - **`domain`** – The configuration document (`buttons` + `server`
//!   settings), the [`Trigger`] value type, and the closed set of
//!   [`LogicalKey`] names a binding may refer to.
//!
//! - **`resolver`** – Pure lookups from a trigger to the sound reference of
//!   the first matching binding.
//!
//! - **`keymap`** – Translation tables from raw platform key codes (Windows
//!   virtual keys, Linux evdev codes) to [`LogicalKey`].
//!
//! - **`protocol`** – The JSON messages exchanged over the session endpoint.

pub mod domain;
pub mod keymap;
pub mod protocol;
pub mod resolver;

pub use domain::document::{ButtonBinding, ConfigDocument, ServerSettings, ValidationError};
pub use domain::trigger::{LogicalKey, Trigger, UnknownKeyName};
pub use keymap::{translate, RawKeyCode};
pub use protocol::messages::{
    decode_client_message, encode_server_message, ClientMessage, ProtocolError, ServerMessage,
};
