//! Application layer for the SounDeck server.
//!
//! Contains the use cases that tie keyboard capture, app sessions and sound
//! playback together.  They depend on the `soundeck_core` domain types and on
//! infrastructure only through traits and the shared [`ConfigStore`], so every
//! use case can be exercised with mocks.
//!
//! - [`dispatch`] – resolve a trigger against the current document and start
//!   playback.
//! - [`key_listener`] – the background thread turning raw key events into
//!   triggers.
//! - [`session_hub`] – the live set of authenticated app sessions.
//!
//! [`ConfigStore`]: crate::infrastructure::storage::ConfigStore

pub mod dispatch;
pub mod key_listener;
pub mod session_hub;

pub use dispatch::{DispatchOutcome, Dispatcher, TriggerSink};
pub use key_listener::KeyListener;
pub use session_hub::{Registration, SessionError, SessionHub, SessionId, SessionState};
