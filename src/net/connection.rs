//! Connection capability consumed by the pool and the client channel.
//!
//! # Responsibilities
//! - Define what a dialed connection must offer (unary call, stream open, close)
//! - Describe calls (`CallInfo`, `StreamDesc`)
//! - Generate unique connection IDs for tracing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tower::BoxError;

use crate::context::Context;
use crate::net::stream::BoxCallStream;
use crate::status::Status;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Description of a unary call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Fully qualified method name, e.g. `/pkg.Service/Method`.
    pub method: String,
}

impl CallInfo {
    pub fn new(method: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            method: method.into(),
        })
    }
}

/// Description of a streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDesc {
    pub method: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl StreamDesc {
    /// A bidirectional stream for `method`.
    pub fn bidi(method: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            method: method.into(),
            client_streaming: true,
            server_streaming: true,
        })
    }
}

/// A live connection able to carry calls.
///
/// Implemented by transports; the pool and the client channel only use it
/// polymorphically. Errors from `invoke` and `new_stream` are returned to the
/// caller verbatim.
pub trait ClientConn: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;
    type Message: Send + 'static;

    /// Issue a single-request/single-response call.
    fn invoke(
        &self,
        ctx: Context,
        info: Arc<CallInfo>,
        req: Self::Request,
    ) -> BoxFuture<'_, Result<Self::Response, Status>>;

    /// Open a stream.
    fn new_stream(
        &self,
        ctx: Context,
        desc: Arc<StreamDesc>,
    ) -> BoxFuture<'_, Result<BoxCallStream<Self::Message>, Status>>;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>>;
}

impl<C: ClientConn> ClientConn for Arc<C> {
    type Request = C::Request;
    type Response = C::Response;
    type Message = C::Message;

    fn invoke(
        &self,
        ctx: Context,
        info: Arc<CallInfo>,
        req: Self::Request,
    ) -> BoxFuture<'_, Result<Self::Response, Status>> {
        (**self).invoke(ctx, info, req)
    }

    fn new_stream(
        &self,
        ctx: Context,
        desc: Arc<StreamDesc>,
    ) -> BoxFuture<'_, Result<BoxCallStream<Self::Message>, Status>> {
        (**self).new_stream(ctx, desc)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        (**self).close()
    }
}
