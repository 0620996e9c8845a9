use thiserror::Error;

use crate::types::MessageId;

/// Input rejected before any store call is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message is longer than {max} characters")]
    MessageTooLong { max: usize },

    #[error("Display name is empty")]
    EmptyUsername,

    #[error("Display name is longer than {max} characters")]
    UsernameTooLong { max: usize },

    #[error("A message is already being sent")]
    SendInProgress,

    #[error("Cooldown active: {remaining_ms} ms remaining")]
    CooldownActive { remaining_ms: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Message store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Message not found: {0}")]
    NotFound(MessageId),

    #[error("Local storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Text suitable for showing to the person using the chat.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation(ValidationError::EmptyMessage) => {
                "Please write something before sending.".to_string()
            }
            ChatError::Validation(ValidationError::MessageTooLong { max }) => {
                format!("Messages can be at most {max} characters long.")
            }
            ChatError::Validation(ValidationError::EmptyUsername) => {
                "Please choose a display name.".to_string()
            }
            ChatError::Validation(ValidationError::UsernameTooLong { max }) => {
                format!("Display names can be at most {max} characters long.")
            }
            ChatError::Validation(ValidationError::SendInProgress) => {
                "Your previous message is still being sent.".to_string()
            }
            ChatError::Validation(ValidationError::CooldownActive { remaining_ms }) => {
                format!(
                    "Please wait {} seconds before sending another message.",
                    remaining_ms.div_ceil(1000)
                )
            }
            ChatError::StoreUnavailable(_) => {
                "We couldn't reach the chat right now. Please try again in a moment.".to_string()
            }
            ChatError::PermissionDenied(_) => {
                "You can only remove your own messages.".to_string()
            }
            ChatError::NotFound(_) => "That message no longer exists.".to_string(),
            ChatError::Storage(_) => {
                "Your chat settings couldn't be saved on this device.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_message_rounds_up_to_seconds() {
        let err = ChatError::from(ValidationError::CooldownActive { remaining_ms: 1_001 });
        assert_eq!(
            err.user_message(),
            "Please wait 2 seconds before sending another message."
        );
    }

    #[test]
    fn test_user_messages_hide_technical_details() {
        let err = ChatError::StoreUnavailable("connection refused (os error 111)".into());
        assert!(!err.user_message().contains("os error"));
        assert!(err.to_string().contains("os error"));
    }
}
