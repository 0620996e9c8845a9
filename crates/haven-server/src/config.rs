//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use haven_shared::constants::{DEFAULT_HTTP_PORT, MAX_MESSAGE_CHARS, SEND_COOLDOWN_MS};
use haven_shared::filter::ContentFilter;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database holding the chat namespace.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// Minimum time between two accepted sends of one identity.
    /// Env: `SEND_COOLDOWN_MS`
    /// Default: `30000`
    pub send_cooldown_ms: u64,

    /// Maximum message length in characters.
    /// Env: `MAX_MESSAGE_CHARS`
    /// Default: `500`
    pub max_message_chars: usize,

    /// Newline/comma separated list of words to redact.
    /// Env: `BANNED_WORDS_FILE`
    /// Default: `None` (built-in list).
    pub banned_words_file: Option<PathBuf>,

    /// Human-readable name for this chat instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Haven Community"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            send_cooldown_ms: SEND_COOLDOWN_MS,
            max_message_chars: MAX_MESSAGE_CHARS,
            banned_words_file: None,
            instance_name: "Haven Community".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("SEND_COOLDOWN_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.send_cooldown_ms = ms,
                Err(_) => tracing::warn!(value = %val, "Invalid SEND_COOLDOWN_MS, using default"),
            }
        }

        if let Some(val) = lookup("MAX_MESSAGE_CHARS") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_message_chars = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_MESSAGE_CHARS, using default"),
            }
        }

        if let Some(path) = lookup("BANNED_WORDS_FILE") {
            if !path.is_empty() {
                config.banned_words_file = Some(PathBuf::from(path));
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Build the content filter, reading `banned_words_file` when set.
    pub fn content_filter(&self) -> std::io::Result<ContentFilter> {
        match &self.banned_words_file {
            Some(path) => {
                let list = std::fs::read_to_string(path)?;
                Ok(ContentFilter::from_word_list(&list))
            }
            None => Ok(ContentFilter::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.send_cooldown_ms, 30_000);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/chat.db"),
            ("SEND_COOLDOWN_MS", "5000"),
            ("INSTANCE_NAME", "Calm Corner"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/chat.db")));
        assert_eq!(config.send_cooldown_ms, 5_000);
        assert_eq!(config.instance_name, "Calm Corner");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("SEND_COOLDOWN_MS", "soon"),
            ("MAX_MESSAGE_CHARS", "0"),
        ]));
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.send_cooldown_ms, SEND_COOLDOWN_MS);
        assert_eq!(config.max_message_chars, MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_content_filter_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "gloom\ndoom\n").unwrap();

        let config = ServerConfig {
            banned_words_file: Some(path),
            ..ServerConfig::default()
        };
        let filter = config.content_filter().unwrap();
        assert_eq!(filter.apply("Doom and gloom"), "**** and *****");
    }
}
