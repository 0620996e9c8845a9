use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ValidationError};
use crate::types::{MessageId, UserId};

/// One record of the chat namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Store-assigned key
    pub id: MessageId,
    /// Filtered body
    pub text: String,
    /// Display name captured at send time
    pub username: String,
    /// Owning identity
    pub user_id: UserId,
    /// Store-assigned creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }
}

/// Ascending by timestamp, ties broken by id.
pub fn sort_messages(messages: &mut [ChatMessage]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

/// The non-deleted messages of a snapshot, in render order.
pub fn visible_messages(snapshot: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut visible: Vec<ChatMessage> = snapshot.iter().filter(|m| m.is_visible()).cloned().collect();
    sort_messages(&mut visible);
    visible
}

/// Body of a send request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub text: String,
    pub username: String,
    pub user_id: UserId,
}

/// Returned once the store has accepted a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub id: MessageId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SoftDeleteRequest {
    pub user_id: UserId,
}

/// JSON error body returned by the chat service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable summary
    pub error: String,
    pub code: String,
    /// Payload of the error variant, without the summary prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl From<&ChatError> for ErrorBody {
    fn from(err: &ChatError) -> Self {
        let (mut remaining_ms, mut max, mut message_id, mut detail) = (None, None, None, None);
        let code = match err {
            ChatError::Validation(v) => match v {
                ValidationError::EmptyMessage => "empty_message",
                ValidationError::MessageTooLong { max: m } => {
                    max = Some(*m);
                    "message_too_long"
                }
                ValidationError::EmptyUsername => "empty_username",
                ValidationError::UsernameTooLong { max: m } => {
                    max = Some(*m);
                    "username_too_long"
                }
                ValidationError::SendInProgress => "send_in_progress",
                ValidationError::CooldownActive { remaining_ms: r } => {
                    remaining_ms = Some(*r);
                    "cooldown_active"
                }
            },
            ChatError::StoreUnavailable(d) => {
                detail = Some(d.clone());
                "store_unavailable"
            }
            ChatError::PermissionDenied(d) => {
                detail = Some(d.clone());
                "permission_denied"
            }
            ChatError::NotFound(id) => {
                message_id = Some(*id);
                "not_found"
            }
            ChatError::Storage(d) => {
                detail = Some(d.clone());
                "storage"
            }
        };

        ErrorBody {
            error: err.to_string(),
            code: code.to_string(),
            detail,
            remaining_ms,
            max,
            message_id,
        }
    }
}

impl ErrorBody {
    /// Rebuild the error the service reported. Unknown codes are treated as
    /// the service being unavailable.
    pub fn into_chat_error(self) -> ChatError {
        let detail = self.detail.unwrap_or(self.error);
        match self.code.as_str() {
            "empty_message" => ValidationError::EmptyMessage.into(),
            "message_too_long" => ValidationError::MessageTooLong {
                max: self.max.unwrap_or_default(),
            }
            .into(),
            "empty_username" => ValidationError::EmptyUsername.into(),
            "username_too_long" => ValidationError::UsernameTooLong {
                max: self.max.unwrap_or_default(),
            }
            .into(),
            "send_in_progress" => ValidationError::SendInProgress.into(),
            "cooldown_active" => ValidationError::CooldownActive {
                remaining_ms: self.remaining_ms.unwrap_or_default(),
            }
            .into(),
            "permission_denied" => ChatError::PermissionDenied(detail),
            "not_found" => match self.message_id {
                Some(id) => ChatError::NotFound(id),
                None => ChatError::StoreUnavailable(detail),
            },
            "storage" => ChatError::Storage(detail),
            _ => ChatError::StoreUnavailable(detail),
        }
    }
}
