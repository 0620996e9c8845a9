//! Client for the dashboard REST API (events carousel and user profile).
//!
//! Both endpoints require the bearer token stored under `user_token`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use haven_shared::constants::{STORAGE_KEY_USER_TOKEN, STORAGE_PATH_PREFIX};
use haven_shared::ChatError;

use crate::storage::KeyValueStore;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("No user token stored")]
    MissingToken,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dashboard returned {0}")]
    Status(reqwest::StatusCode),

    #[error("Dashboard reported an unsuccessful response")]
    Unsuccessful,

    #[error(transparent)]
    Storage(#[from] ChatError),
}

/// Ids come back as numbers or strings depending on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEvent {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    success: bool,
    #[serde(default)]
    events: Vec<DashboardEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardUser {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// `{ "user": {...} }` or the bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserResponse {
    Wrapped { user: DashboardUser },
    Bare(DashboardUser),
}

impl UserResponse {
    fn into_user(self) -> DashboardUser {
        match self {
            UserResponse::Wrapped { user } => user,
            UserResponse::Bare(user) => user,
        }
    }
}

pub struct DashboardClient {
    client: reqwest::Client,
    api_base_url: String,
    storage_base_url: String,
    storage: Arc<dyn KeyValueStore>,
}

impl DashboardClient {
    pub fn new(api_base_url: &str, storage_base_url: &str, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            storage_base_url: storage_base_url.trim_end_matches('/').to_string(),
            storage,
        }
    }

    /// Upcoming events, with image paths resolved to absolute URLs.
    pub async fn events(&self) -> Result<Vec<DashboardEvent>, DashboardError> {
        let body: EventsResponse = self.get_json("/user/events").await?;
        if !body.success {
            warn!("Dashboard events request was not successful");
            return Err(DashboardError::Unsuccessful);
        }

        let events: Vec<DashboardEvent> = body
            .events
            .into_iter()
            .map(|mut event| {
                event.image = event
                    .image
                    .map(|path| resolve_image_url(&self.storage_base_url, &path));
                event
            })
            .collect();

        debug!(count = events.len(), "Fetched dashboard events");
        Ok(events)
    }

    pub async fn user(&self) -> Result<DashboardUser, DashboardError> {
        let body: UserResponse = self.get_json("/user/dashboard/user").await?;
        let mut user = body.into_user();
        user.image = user
            .image
            .map(|path| resolve_image_url(&self.storage_base_url, &path));
        Ok(user)
    }

    fn token(&self) -> Result<String, DashboardError> {
        match self.storage.get(STORAGE_KEY_USER_TOKEN)? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(DashboardError::MissingToken),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, DashboardError> {
        let token = self.token()?;
        let url = format!("{}{path}", self.api_base_url);

        let resp = self.client.get(&url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            warn!(url = %url, status = %resp.status(), "Dashboard request failed");
            return Err(DashboardError::Status(resp.status()));
        }

        Ok(resp.json().await?)
    }
}

/// Absolute URLs pass through; anything else is served from storage.
pub fn resolve_image_url(storage_base_url: &str, path: &str) -> String {
    if path.starts_with("http") {
        return path.to_string();
    }
    format!(
        "{}{STORAGE_PATH_PREFIX}{}",
        storage_base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
