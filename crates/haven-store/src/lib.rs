//! # haven-store
//!
//! Persistence for the Haven community chat, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle with typed helpers
//! for the message log, the per-identity send log and the client-side
//! key-value storage, plus [`ChatLog`]: the async service boundary that
//! validates writes, enforces ownership and cooldown, and fans full
//! snapshots out to subscribers.

pub mod chat_log;
pub mod client_storage;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod send_log;

mod error;

pub use chat_log::{ChatLog, LogPolicy};
pub use database::Database;
pub use error::StoreError;
