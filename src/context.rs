//! Per-call context threaded through interceptors and handlers.
//!
//! # Responsibilities
//! - Carry typed request-scoped values (auth claims, request IDs, ...)
//! - Carry outgoing call metadata (headers)
//! - Carry an optional deadline
//!
//! # Design Decisions
//! - Passed by value: an interceptor derives a new context and hands it to
//!   its continuation, so later stages only see what earlier stages produced
//! - Cancellation and deadlines are never manufactured by the core, only
//!   carried and reported

use http::{Extensions, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Sentinel errors describing why a call context is no longer usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Call context.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Extensions,
    metadata: HeaderMap,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context carrying `value`. A previous value of the same type is
    /// replaced.
    pub fn with_value<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Derive a context with one more outgoing header. Existing values for the
    /// same name are kept.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.metadata.append(name, value);
        self
    }

    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut HeaderMap {
        &mut self.metadata
    }

    /// Derive a context that expires at `deadline`, or earlier if the current
    /// deadline is sooner.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Reports `DeadlineExceeded` once the deadline has passed.
    pub fn err(&self) -> Option<ContextError> {
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }
}
