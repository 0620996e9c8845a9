//! # haven-server
//!
//! Realtime store service for the Haven community chat.
//!
//! This binary provides:
//! - the **chat namespace** over HTTP: full snapshots, server-sent event
//!   streams of snapshots, append and soft-delete
//! - **store-side moderation**: content filtering, length limits, the
//!   per-identity send cooldown and delete ownership checks
//! - periodic cleanup of expired cooldown entries

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use haven_shared::clock::SystemClock;
use haven_shared::cooldown::CooldownWindow;
use haven_store::{ChatLog, Database, LogPolicy};

use haven_server::api::{self, AppState};
use haven_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,haven_server=debug")),
        )
        .init();

    info!("Starting Haven chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and build the chat log
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => {
            info!(path = %path.display(), "opening database");
            Database::open_at(path)?
        }
        None => Database::new()?,
    };

    let filter = config.content_filter()?;
    info!(words = filter.word_count(), "Content filter ready");

    let policy = LogPolicy {
        cooldown: CooldownWindow::from_millis(config.send_cooldown_ms),
        max_message_chars: config.max_message_chars,
        filter,
        ..LogPolicy::default()
    };

    let chat = Arc::new(ChatLog::new(db, Arc::new(SystemClock), policy)?);

    let app_state = AppState {
        chat: chat.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic cooldown cleanup (every 5 minutes)
    let log = chat.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            if let Err(e) = log.purge_expired_cooldowns().await {
                tracing::warn!(error = %e, "Cooldown cleanup failed");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
