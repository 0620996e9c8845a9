//! Normalization and bounds checks shared by the client and the store.

use crate::error::ValidationError;

/// Trim a message body and check it is non-empty and within `max` chars.
pub fn message_text(text: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::MessageTooLong { max });
    }
    Ok(trimmed.to_string())
}

/// Trim a display name and check it is non-empty and within `max` chars.
pub fn username(name: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::UsernameTooLong { max });
    }
    Ok(trimmed.to_string())
}
