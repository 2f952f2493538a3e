//! The JSON protocol spoken on the persistent session endpoint.

pub mod messages;
