//! Storage infrastructure: configuration file persistence.
//!
//! The `config_store` sub-module handles:
//!
//! - Reading the JSON configuration document from the platform-appropriate
//!   directory (or an explicit `--config` path).
//! - Publishing immutable snapshots to every reader.
//! - Writing changes back to disk atomically when the credential is
//!   bootstrapped or an administrator replaces the document.

pub mod config_store;

pub use config_store::{default_config_path, ConfigError, ConfigStore};
