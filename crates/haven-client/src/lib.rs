//! # haven-client
//!
//! The embeddable side of the Haven community chat: a session object that
//! owns the local identity, applies content filtering and the send cooldown
//! before anything reaches the store, keeps a live subscription to the
//! message log, and projects snapshots into what a chat widget renders.

pub mod config;
pub mod dashboard;
pub mod http_store;
pub mod identity;
pub mod rate_limiter;
pub mod session;
pub mod storage;
pub mod store_client;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use identity::IdentityContext;
pub use session::ChatSession;
pub use store_client::{LocalMessageStore, MessageStore, Subscription};

/// Install a `tracing` subscriber for applications embedding the client.
/// Honors `RUST_LOG`; does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("haven_client=debug,haven_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
