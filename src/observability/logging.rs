//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Pick the log level from `RUST_LOG`, falling back to a crate default
//!
//! # Design Decisions
//! - The library itself only emits events; installing a subscriber is left
//!   to binaries and tests
//! - Installing twice is not an error, the first subscriber stays

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "rpc_dispatch=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (or `default_filter`).
///
/// Returns `false` when a global subscriber was already set.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
