use thiserror::Error;

use haven_shared::{ChatError, MessageId};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No message with this id exists.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The requester does not own the message it tried to change.
    #[error("Message {message_id} is not owned by the requesting identity")]
    NotOwner { message_id: MessageId },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ChatError::NotFound(id),
            StoreError::NotOwner { message_id } => ChatError::PermissionDenied(format!(
                "message {message_id} belongs to another user"
            )),
            other => ChatError::StoreUnavailable(other.to_string()),
        }
    }
}
