//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! connection string (grpc://host:port?options)
//!     → dsn.rs (parse & validate options)
//!     → ClientConfig (immutable)
//!     → client::Dialer
//!
//! config file (TOML, [clients] table)
//!     → loader.rs (deserialize, parse each connection string)
//!     → named ClientConfig values
//! ```
//!
//! # Design Decisions
//! - Config is immutable once parsed
//! - Every field has a default so minimal connection strings work
//! - Unknown options are rejected rather than ignored

pub mod dsn;
pub mod loader;
pub mod schema;

pub use dsn::{parse_duration, parse_host_and_port};
pub use loader::{load_config, ConfigError};
pub use schema::{ClientConfig, TlsConfig};
