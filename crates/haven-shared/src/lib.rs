//! # haven-shared
//!
//! Types shared by the Haven community chat store, server and client:
//! the message record and its wire protocol, the error taxonomy, and the
//! two pure moderation rules (content filtering and send cooldown).

pub mod clock;
pub mod constants;
pub mod cooldown;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod types;
pub mod validate;

pub use error::{ChatError, ValidationError};
pub use protocol::ChatMessage;
pub use types::{LocalIdentity, MessageId, UserId};
