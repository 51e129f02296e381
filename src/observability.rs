//! Structured logging/tracing initialization (§4.15).
//!
//! Supersedes a bare `log`+`env_logger` pairing: the Agent Graph's per-request
//! node sequence (§4.9.9) nests cleanly under `tracing`'s span hierarchy,
//! which flat `log` macros cannot express.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info` when unset. Call once at process startup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
