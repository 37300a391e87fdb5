//! Maxbot core contracts and value types.
//!
//! This crate holds the records exchanged with the remote bot platform (the
//! webhook/polling event envelope plus the chat, message and scenario shapes)
//! and the classified error type shared by the outbound client. The records
//! are transported as-is; nothing here interprets scenario or message
//! payloads.
pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// API version segment used in every REST path (`/api/{version}/...`).
pub const API_VERSION: &str = "v1";
