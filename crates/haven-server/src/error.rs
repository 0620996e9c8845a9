use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use haven_shared::protocol::ErrorBody;
use haven_shared::{ChatError, ValidationError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Chat(ChatError::Validation(ValidationError::CooldownActive { .. })) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ServerError::Chat(ChatError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::Chat(ChatError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            ServerError::Chat(ChatError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Chat(ChatError::StoreUnavailable(_) | ChatError::Storage(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ServerError::Chat(err @ (ChatError::StoreUnavailable(_) | ChatError::Storage(_))) => {
                tracing::error!(error = %err, "Chat store failure");
                ErrorBody {
                    error: "Chat store unavailable".to_string(),
                    detail: None,
                    ..ErrorBody::from(err)
                }
            }
            ServerError::Chat(err) => ErrorBody::from(err),
            ServerError::BadRequest(msg) => ErrorBody {
                error: msg.clone(),
                code: "bad_request".to_string(),
                detail: Some(msg.clone()),
                remaining_ms: None,
                max: None,
                message_id: None,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_shared::MessageId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServerError::from(ChatError::from(ValidationError::CooldownActive {
                    remaining_ms: 1,
                })),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ServerError::from(ChatError::from(ValidationError::EmptyMessage)),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::from(ChatError::PermissionDenied("no".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ServerError::from(ChatError::NotFound(MessageId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::from(ChatError::StoreUnavailable("db".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn test_store_failure_details_stay_private() {
        use http_body_util::BodyExt;

        let resp = ServerError::from(ChatError::StoreUnavailable("/var/lib/haven locked".into()))
            .into_response();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body.code, "store_unavailable");
        assert_eq!(body.error, "Chat store unavailable");
        assert!(body.detail.is_none());
    }
}
