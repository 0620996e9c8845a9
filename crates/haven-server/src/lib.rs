//! HTTP surface of the Haven chat store: router, configuration and error
//! mapping. The `haven-server` binary wires these to a SQLite-backed
//! [`haven_store::ChatLog`].

pub mod api;
pub mod config;
pub mod error;
