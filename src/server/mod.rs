//! Server-side call pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound call
//!     → recovery interceptor (panic → Status)
//!     → user interceptors (registration order)
//!     → domain handler (Result<_, BoxError>)
//!     → ErrorMapper (domain error → Status)
//!     → back to the transport
//! ```
//!
//! # Design Decisions
//! - Recovery is installed first so a panicking interceptor is covered too
//! - Handlers return `BoxError`; an error that already is a `Status` is
//!   passed through unchanged, anything else goes through the mapper
//! - Endpoints are built once and shared; calling one allocates nothing
//!   beyond the futures themselves

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tower::BoxError;

use crate::context::Context;
use crate::middleware::chain::{
    stream_handler_fn, unary_handler_fn, StreamChain, StreamHandler, StreamInterceptor, UnaryChain,
    UnaryHandler, UnaryInterceptor,
};
use crate::middleware::recovery::{self, RecoveryOptions};
use crate::net::{BoxCallStream, CallInfo, StreamDesc};
use crate::status::{ErrorMapper, Status};

/// Interceptors, recovery and error mapping shared by a service's endpoints.
pub struct ServerPipeline<Req, Resp, M> {
    mapper: Arc<ErrorMapper>,
    recovery: RecoveryOptions,
    unary: Vec<UnaryInterceptor<Req, Resp>>,
    stream: Vec<StreamInterceptor<M>>,
}

impl<Req, Resp, M> ServerPipeline<Req, Resp, M>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    M: Send + 'static,
{
    pub fn new(mapper: Arc<ErrorMapper>) -> Self {
        Self {
            mapper,
            recovery: RecoveryOptions::new(),
            unary: Vec::new(),
            stream: Vec::new(),
        }
    }

    pub fn with_recovery(mut self, opts: RecoveryOptions) -> Self {
        self.recovery = opts;
        self
    }

    pub fn with_unary_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = UnaryInterceptor<Req, Resp>>,
    ) -> Self {
        self.unary.extend(interceptors);
        self
    }

    pub fn with_stream_interceptors(mut self, interceptors: impl IntoIterator<Item = StreamInterceptor<M>>) -> Self {
        self.stream.extend(interceptors);
        self
    }

    pub fn mapper(&self) -> &Arc<ErrorMapper> {
        &self.mapper
    }

    /// Wrap a unary domain handler.
    pub fn unary<F, Fut>(&self, handler: F) -> UnaryEndpoint<Req, Resp>
    where
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
    {
        let mapper = self.mapper.clone();
        let handler = unary_handler_fn(move |ctx: Context, req: Req| {
            let fut = handler(ctx, req);
            let mapper = mapper.clone();
            async move { fut.await.map_err(|err| to_status(&mapper, err)) }
        });

        let chain = UnaryChain::new(
            std::iter::once(recovery::unary_server_interceptor(self.recovery.clone()))
                .chain(self.unary.iter().cloned()),
        );

        UnaryEndpoint { chain, handler }
    }

    /// Wrap a streaming domain handler.
    pub fn stream<F, Fut>(&self, handler: F) -> StreamEndpoint<M>
    where
        F: Fn(BoxCallStream<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let mapper = self.mapper.clone();
        let handler = stream_handler_fn(move |stream: BoxCallStream<M>| {
            let fut = handler(stream);
            let mapper = mapper.clone();
            async move { fut.await.map_err(|err| to_status(&mapper, err)) }
        });

        let chain = StreamChain::new(
            std::iter::once(recovery::stream_server_interceptor(self.recovery.clone()))
                .chain(self.stream.iter().cloned()),
        );

        StreamEndpoint { chain, handler }
    }
}

impl<Req, Resp, M> std::fmt::Debug for ServerPipeline<Req, Resp, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPipeline")
            .field("recovery", &self.recovery)
            .field("unary_interceptors", &self.unary.len())
            .field("stream_interceptors", &self.stream.len())
            .finish()
    }
}

fn to_status(mapper: &ErrorMapper, err: BoxError) -> Status {
    match err.downcast::<Status>() {
        Ok(status) => *status,
        Err(err) => {
            let status = mapper.map_err(&*err);
            tracing::debug!(code = %status.code(), error = %err, "handler error mapped to status");
            status
        }
    }
}

/// A unary handler behind the server chain.
pub struct UnaryEndpoint<Req, Resp> {
    chain: UnaryChain<Req, Resp>,
    handler: UnaryHandler<Req, Resp>,
}

impl<Req: Send + 'static, Resp: Send + 'static> UnaryEndpoint<Req, Resp> {
    pub fn call(&self, ctx: Context, req: Req, info: Arc<CallInfo>) -> BoxFuture<'static, Result<Resp, Status>> {
        self.chain.invoke(ctx, req, info, self.handler.clone())
    }
}

impl<Req, Resp> Clone for UnaryEndpoint<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// A streaming handler behind the server chain.
pub struct StreamEndpoint<M> {
    chain: StreamChain<M>,
    handler: StreamHandler<M>,
}

impl<M: Send + 'static> StreamEndpoint<M> {
    pub fn call(&self, stream: BoxCallStream<M>, desc: Arc<StreamDesc>) -> BoxFuture<'static, Result<(), Status>> {
        self.chain.invoke(stream, desc, self.handler.clone())
    }
}

impl<M> Clone for StreamEndpoint<M> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            handler: self.handler.clone(),
        }
    }
}
