//! Infrastructure layer for the SounDeck server.
//!
//! Contains OS-facing adapters: keyboard capture, sound playback through an
//! external player, configuration file storage, and the HTTP/WebSocket
//! surface the app connects to.
//!
//! **Dependency rule**: the `application` layer only sees these adapters
//! through the traits it defines or re-exports (`InputSource`,
//! `PlaybackGateway`, `TriggerSink`) and through `ConfigStore`.

pub mod input_capture;
pub mod playback;
pub mod storage;
pub mod web;
