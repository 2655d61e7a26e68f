//! Student alert and insight generation for parent-facing dashboards.
//!
//! The [`engine::AlertEngine`] turns raw student signals into prioritized
//! alerts and cross-domain insights. It prefers a generative text backend
//! and falls back to deterministic rules whenever that backend is missing,
//! slow, or returns something unusable.

pub mod adapter;
pub mod classify;
pub mod completion;
pub mod config;
pub mod correlation;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod insight;
pub mod models;
pub mod report;
pub mod rules;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber on stderr. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
