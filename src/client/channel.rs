//! Client channel: a connection with client interceptor chains in front.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tower::BoxError;

use crate::context::Context;
use crate::middleware::chain::{StreamOpenInterceptor, UnaryChain, UnaryInterceptor};
use crate::net::{BoxCallStream, CallInfo, ClientConn, StreamDesc};
use crate::status::Status;

/// Runs every call through the client chains before handing it to the
/// underlying connection (a single connection or a [`crate::ConnPool`]).
pub struct Channel<C: ClientConn> {
    conn: Arc<C>,
    unary: UnaryChain<C::Request, C::Response>,
    stream: UnaryChain<Arc<StreamDesc>, BoxCallStream<C::Message>>,
}

impl<C: ClientConn> Channel<C> {
    pub fn new(
        conn: C,
        unary: impl IntoIterator<Item = UnaryInterceptor<C::Request, C::Response>>,
        stream: impl IntoIterator<Item = StreamOpenInterceptor<C::Message>>,
    ) -> Self {
        Self {
            conn: Arc::new(conn),
            unary: UnaryChain::new(unary),
            stream: UnaryChain::new(stream),
        }
    }

    /// The wrapped connection.
    pub fn get_ref(&self) -> &C {
        &self.conn
    }

    pub fn unary_chain(&self) -> &UnaryChain<C::Request, C::Response> {
        &self.unary
    }

    pub fn stream_chain(&self) -> &UnaryChain<Arc<StreamDesc>, BoxCallStream<C::Message>> {
        &self.stream
    }
}

impl<C: ClientConn> Clone for Channel<C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            unary: self.unary.clone(),
            stream: self.stream.clone(),
        }
    }
}

impl<C: ClientConn> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("unary_interceptors", &self.unary.len())
            .field("stream_interceptors", &self.stream.len())
            .finish()
    }
}

impl<C: ClientConn> ClientConn for Channel<C> {
    type Request = C::Request;
    type Response = C::Response;
    type Message = C::Message;

    fn invoke(
        &self,
        ctx: Context,
        info: Arc<CallInfo>,
        req: Self::Request,
    ) -> BoxFuture<'_, Result<Self::Response, Status>> {
        let conn = self.conn.clone();
        let call = info.clone();

        self.unary.invoke_with(ctx, req, info, move |ctx, req| {
            Box::pin(async move { conn.invoke(ctx, call, req).await })
        })
    }

    fn new_stream(
        &self,
        ctx: Context,
        desc: Arc<StreamDesc>,
    ) -> BoxFuture<'_, Result<BoxCallStream<Self::Message>, Status>> {
        let conn = self.conn.clone();
        let info = CallInfo::new(desc.method.clone());

        self.stream.invoke_with(ctx, desc, info, move |ctx, desc| {
            Box::pin(async move { conn.new_stream(ctx, desc).await })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        self.conn.close()
    }
}
