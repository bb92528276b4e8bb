//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool / dialer / recovery / server pipeline
//!     → tracing events with structured fields
//!     → logging.rs subscriber (fmt, EnvFilter)
//! ```
//!
//! # Design Decisions
//! - Call paths log at `trace!`, lifecycle at `debug!`/`info!`
//! - Failures that are swallowed (close errors, recovered panics) are always
//!   logged at `warn!` or `error!`

pub mod logging;

pub use logging::init as init_logging;
