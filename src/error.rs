//! Crate-level error type for setup operations.
//!
//! Call paths report `Status`; everything that happens before a call is
//! issued (building pools, parsing configuration, dialing) reports `Error`.

use std::time::Duration;
use thiserror::Error;
use tower::BoxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("balancer requires at least one item")]
    EmptyBalancer,

    #[error("connection pool requires at least one connection")]
    EmptyPool,

    #[error("invalid client connection string: {0}")]
    InvalidDsn(String),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to close {} pooled connection(s)", .0.len())]
    Close(Vec<CloseFailure>),

    #[error("dial failed: {0}")]
    Dial(#[source] BoxError),

    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),
}

/// A single connection that failed to close, identified by its pool index.
#[derive(Debug)]
pub struct CloseFailure {
    pub index: usize,
    pub error: BoxError,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
