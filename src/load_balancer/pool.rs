//! Connection pool.
//!
//! # Responsibilities
//! - Own a fixed set of dialed connections
//! - Spread calls across them with a round-robin [`Balancer`]
//! - Close every member exactly once, reporting per-connection failures

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tower::BoxError;

use crate::context::Context;
use crate::error::{CloseFailure, Error, Result};
use crate::load_balancer::round_robin::Balancer;
use crate::net::{BoxCallStream, CallInfo, ClientConn, ConnectionId, StreamDesc};
use crate::status::Status;

/// A connection owned by a pool.
#[derive(Debug)]
pub struct PooledConn<C> {
    pub id: ConnectionId,
    pub conn: C,
}

/// A pool of connections presenting itself as a single [`ClientConn`].
///
/// Each call goes to exactly one member, chosen round-robin. Failed calls are
/// returned as-is; the pool never retries on another member.
#[derive(Debug)]
pub struct ConnPool<C> {
    balancer: Balancer<PooledConn<C>>,
    closed: AtomicBool,
}

impl<C: ClientConn> ConnPool<C> {
    /// Build a pool from already dialed connections. Fails on an empty set.
    pub fn new(conns: impl IntoIterator<Item = C>) -> Result<Self> {
        let members = conns.into_iter().map(|conn| PooledConn {
            id: ConnectionId::new(),
            conn,
        });

        let balancer = Balancer::new(members).map_err(|_| Error::EmptyPool)?;
        tracing::debug!(size = balancer.len(), "connection pool created");

        Ok(Self {
            balancer,
            closed: AtomicBool::new(false),
        })
    }

    pub fn len(&self) -> usize {
        self.balancer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancer.is_empty()
    }

    pub fn members(&self) -> &[PooledConn<C>] {
        self.balancer.items()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every connection in the pool.
    ///
    /// A failing member does not stop the remaining ones from being closed;
    /// all failures are logged and returned together. Calling this again is
    /// a no-op.
    pub async fn close_all(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!("connection pool already closed");
            return Ok(());
        }

        let mut failures = Vec::new();
        for (index, member) in self.balancer.items().iter().enumerate() {
            if let Err(error) = member.conn.close().await {
                tracing::warn!(
                    index,
                    conn = %member.id,
                    error = %error,
                    "failed to close pooled connection"
                );
                failures.push(CloseFailure { index, error });
            }
        }

        if failures.is_empty() {
            tracing::debug!(size = self.len(), "connection pool closed");
            Ok(())
        } else {
            Err(Error::Close(failures))
        }
    }
}

impl<C: ClientConn> ClientConn for ConnPool<C> {
    type Request = C::Request;
    type Response = C::Response;
    type Message = C::Message;

    fn invoke(
        &self,
        ctx: Context,
        info: Arc<CallInfo>,
        req: Self::Request,
    ) -> BoxFuture<'_, Result<Self::Response, Status>> {
        let member = self.balancer.next();
        tracing::trace!(conn = %member.id, method = %info.method, "dispatching unary call");
        member.conn.invoke(ctx, info, req)
    }

    fn new_stream(
        &self,
        ctx: Context,
        desc: Arc<StreamDesc>,
    ) -> BoxFuture<'_, Result<BoxCallStream<Self::Message>, Status>> {
        let member = self.balancer.next();
        tracing::trace!(conn = %member.id, method = %desc.method, "opening stream");
        member.conn.new_stream(ctx, desc)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        Box::pin(async move { self.close_all().await.map_err(BoxError::from) })
    }
}
