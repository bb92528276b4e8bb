//! Client subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig
//!     → dialer.rs (interceptors + header injection, dial via Connector)
//!     → channel.rs (client chains in front of a connection or pool)
//!     → net::ClientConn (transport supplied by the caller)
//! ```
//!
//! # Design Decisions
//! - Stream opening goes through a unary-shaped chain: interceptors see the
//!   stream description and get back the opened stream
//! - Header injection runs after user interceptors, so it sees their context

pub mod channel;
pub mod dialer;

pub use channel::Channel;
pub use dialer::{Connector, Dialer};
