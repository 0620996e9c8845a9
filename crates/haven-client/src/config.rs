//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::sync::Arc;

use haven_shared::filter::ContentFilter;
use haven_shared::ChatError;

use crate::dashboard::DashboardClient;
use crate::http_store::HttpMessageStore;
use crate::storage::{KeyValueStore, SqliteStorage};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat service.
    /// Env: `HAVEN_CHAT_URL`
    /// Default: `http://127.0.0.1:8080`
    pub chat_url: String,

    /// Base URL of the dashboard REST API.
    /// Env: `HAVEN_API_URL`
    pub api_url: String,

    /// Base URL that relative dashboard image paths resolve against.
    /// Env: `HAVEN_STORAGE_URL`
    pub storage_url: String,

    /// Extra list of words to redact before sending.
    /// Env: `HAVEN_BANNED_WORDS_FILE`
    pub banned_words_file: Option<PathBuf>,

    /// SQLite file for persistent client storage.
    /// Env: `HAVEN_STORAGE_PATH`
    /// Default: `None` (platform data directory).
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://127.0.0.1:8080".to_string(),
            api_url: "http://127.0.0.1:8000/api".to_string(),
            storage_url: "http://127.0.0.1:8000".to_string(),
            banned_words_file: None,
            storage_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("HAVEN_CHAT_URL") {
            config.chat_url = url;
        }
        if let Some(url) = non_empty("HAVEN_API_URL") {
            config.api_url = url;
        }
        if let Some(url) = non_empty("HAVEN_STORAGE_URL") {
            config.storage_url = url;
        }
        if let Some(path) = non_empty("HAVEN_BANNED_WORDS_FILE") {
            config.banned_words_file = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("HAVEN_STORAGE_PATH") {
            config.storage_path = Some(PathBuf::from(path));
        }

        config
    }

    /// The built-in word list, or the configured file when set.
    pub fn content_filter(&self) -> std::io::Result<ContentFilter> {
        match &self.banned_words_file {
            Some(path) => Ok(ContentFilter::from_word_list(&std::fs::read_to_string(path)?)),
            None => Ok(ContentFilter::default()),
        }
    }

    pub fn open_storage(&self) -> Result<Arc<dyn KeyValueStore>, ChatError> {
        let storage = match &self.storage_path {
            Some(path) => SqliteStorage::open_at(path)?,
            None => SqliteStorage::open_default()?,
        };
        Ok(Arc::new(storage))
    }

    pub fn message_store(&self) -> HttpMessageStore {
        HttpMessageStore::new(&self.chat_url)
    }

    pub fn dashboard(&self, storage: Arc<dyn KeyValueStore>) -> DashboardClient {
        DashboardClient::new(&self.api_url, &self.storage_url, storage)
    }
}
