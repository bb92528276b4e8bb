//! RPC dispatch and middleware runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client side                                   Server side
//!
//!   caller                                        transport
//!     │                                             │
//!     ▼                                             ▼
//!   client::Channel                               server::ServerPipeline
//!     │  unary / stream-open chain                  │  recovery interceptor
//!     │  (user interceptors, header injection)      │  user interceptors
//!     ▼                                             ▼
//!   load_balancer::ConnPool                       domain handler
//!     │  round-robin Balancer picks a member        │
//!     ▼                                             ▼
//!   net::ClientConn (transport)                   status::ErrorMapper → Status
//! ```
//!
//! Transports, encoding and dialing are supplied by the caller through the
//! [`net::ClientConn`] and [`client::Connector`] traits.

// Core subsystems
pub mod context;
pub mod error;
pub mod load_balancer;
pub mod middleware;
pub mod net;
pub mod status;

// Client and server wiring
pub mod client;
pub mod config;
pub mod server;

// Cross-cutting concerns
pub mod observability;

pub use client::{Channel, Connector, Dialer};
pub use config::ClientConfig;
pub use context::{Context, ContextError};
pub use error::{Error, Result};
pub use load_balancer::{Balancer, ConnPool};
pub use net::{BoxCallStream, CallInfo, CallStream, ClientConn, StreamDesc};
pub use server::ServerPipeline;
pub use status::{Code, ErrorMapper, Identity, Status};
