//! Domain types shared by every SounDeck component.
//!
//! - [`document`] – the persisted configuration document.
//! - [`trigger`] – the logical events that can be resolved to a sound.

pub mod document;
pub mod trigger;
