//! Interceptor chaining.
//!
//! A chain runs its interceptors left to right. Each interceptor receives a
//! continuation ([`UnaryNext`] / [`StreamNext`]) pointing at the rest of the
//! chain; running it hands control, and the context or stream the interceptor
//! chose, to the next stage. Not running it short-circuits the call.
//!
//! Continuations are consumed by `run`, so each stage executes at most once
//! per call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::net::{BoxCallStream, CallInfo, StreamDesc};
use crate::status::Status;

/// Terminal handler of a unary chain.
pub type UnaryHandler<Req, Resp> =
    Arc<dyn Fn(Context, Req) -> BoxFuture<'static, Result<Resp, Status>> + Send + Sync>;

/// Unary interceptor: `(context, request, call info, continuation)`.
pub type UnaryInterceptor<Req, Resp> = Arc<
    dyn Fn(Context, Req, Arc<CallInfo>, UnaryNext<Req, Resp>) -> BoxFuture<'static, Result<Resp, Status>>
        + Send
        + Sync,
>;

/// Terminal handler of a stream chain.
pub type StreamHandler<M> =
    Arc<dyn Fn(BoxCallStream<M>) -> BoxFuture<'static, Result<(), Status>> + Send + Sync>;

/// Stream interceptor: `(stream, stream description, continuation)`.
pub type StreamInterceptor<M> = Arc<
    dyn Fn(BoxCallStream<M>, Arc<StreamDesc>, StreamNext<M>) -> BoxFuture<'static, Result<(), Status>>
        + Send
        + Sync,
>;

/// Client interceptor around opening a stream: the "request" is the stream
/// description and the "response" the opened stream.
pub type StreamOpenInterceptor<M> = UnaryInterceptor<Arc<StreamDesc>, BoxCallStream<M>>;

type UnaryTerminal<Req, Resp> =
    Box<dyn FnOnce(Context, Req) -> BoxFuture<'static, Result<Resp, Status>> + Send>;

type StreamTerminal<M> = Box<dyn FnOnce(BoxCallStream<M>) -> BoxFuture<'static, Result<(), Status>> + Send>;

/// Build a [`UnaryInterceptor`] from an async closure.
pub fn unary_fn<Req, Resp, F, Fut>(f: F) -> UnaryInterceptor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Context, Req, Arc<CallInfo>, UnaryNext<Req, Resp>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    Arc::new(move |ctx: Context, req: Req, info: Arc<CallInfo>, next: UnaryNext<Req, Resp>| {
        Box::pin(f(ctx, req, info, next)) as BoxFuture<'static, Result<Resp, Status>>
    })
}

/// Build a [`UnaryHandler`] from an async closure.
pub fn unary_handler_fn<Req, Resp, F, Fut>(f: F) -> UnaryHandler<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    Arc::new(move |ctx: Context, req: Req| {
        Box::pin(f(ctx, req)) as BoxFuture<'static, Result<Resp, Status>>
    })
}

/// Build a [`StreamInterceptor`] from an async closure.
pub fn stream_fn<M, F, Fut>(f: F) -> StreamInterceptor<M>
where
    M: Send + 'static,
    F: Fn(BoxCallStream<M>, Arc<StreamDesc>, StreamNext<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    Arc::new(move |stream: BoxCallStream<M>, desc: Arc<StreamDesc>, next: StreamNext<M>| {
        Box::pin(f(stream, desc, next)) as BoxFuture<'static, Result<(), Status>>
    })
}

/// Build a [`StreamHandler`] from an async closure.
pub fn stream_handler_fn<M, F, Fut>(f: F) -> StreamHandler<M>
where
    M: Send + 'static,
    F: Fn(BoxCallStream<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    Arc::new(move |stream: BoxCallStream<M>| {
        Box::pin(f(stream)) as BoxFuture<'static, Result<(), Status>>
    })
}

/// Continuation of a unary chain.
pub struct UnaryNext<Req, Resp> {
    interceptors: Arc<[UnaryInterceptor<Req, Resp>]>,
    index: usize,
    info: Arc<CallInfo>,
    terminal: UnaryTerminal<Req, Resp>,
}

impl<Req: Send + 'static, Resp: Send + 'static> UnaryNext<Req, Resp> {
    /// A continuation that goes straight to `handler`.
    pub fn handler(handler: UnaryHandler<Req, Resp>, info: Arc<CallInfo>) -> Self {
        Self::terminal(info, move |ctx, req| handler(ctx, req))
    }

    /// A continuation that ends in a one-shot closure.
    pub fn terminal<F>(info: Arc<CallInfo>, f: F) -> Self
    where
        F: FnOnce(Context, Req) -> BoxFuture<'static, Result<Resp, Status>> + Send + 'static,
    {
        Self {
            interceptors: Arc::from(Vec::new()),
            index: 0,
            info,
            terminal: Box::new(f),
        }
    }

    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    /// Hand `ctx` and `req` to the next stage.
    pub fn run(self, ctx: Context, req: Req) -> BoxFuture<'static, Result<Resp, Status>> {
        let UnaryNext {
            interceptors,
            index,
            info,
            terminal,
        } = self;

        match interceptors.get(index).cloned() {
            Some(interceptor) => {
                let next = UnaryNext {
                    interceptors,
                    index: index + 1,
                    info: info.clone(),
                    terminal,
                };
                interceptor(ctx, req, info, next)
            }
            None => terminal(ctx, req),
        }
    }
}

impl<Req, Resp> fmt::Debug for UnaryNext<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryNext")
            .field("method", &self.info.method)
            .field("remaining", &(self.interceptors.len() - self.index))
            .finish()
    }
}

/// Continuation of a stream chain.
pub struct StreamNext<M> {
    interceptors: Arc<[StreamInterceptor<M>]>,
    index: usize,
    desc: Arc<StreamDesc>,
    terminal: StreamTerminal<M>,
}

impl<M: Send + 'static> StreamNext<M> {
    pub fn handler(handler: StreamHandler<M>, desc: Arc<StreamDesc>) -> Self {
        Self::terminal(desc, move |stream| handler(stream))
    }

    pub fn terminal<F>(desc: Arc<StreamDesc>, f: F) -> Self
    where
        F: FnOnce(BoxCallStream<M>) -> BoxFuture<'static, Result<(), Status>> + Send + 'static,
    {
        Self {
            interceptors: Arc::from(Vec::new()),
            index: 0,
            desc,
            terminal: Box::new(f),
        }
    }

    pub fn desc(&self) -> &StreamDesc {
        &self.desc
    }

    /// Hand `stream` to the next stage. Later stages observe exactly this
    /// handle, so substituting it (see [`crate::net::with_context`]) is how a
    /// stream interceptor changes what downstream sees.
    pub fn run(self, stream: BoxCallStream<M>) -> BoxFuture<'static, Result<(), Status>> {
        let StreamNext {
            interceptors,
            index,
            desc,
            terminal,
        } = self;

        match interceptors.get(index).cloned() {
            Some(interceptor) => {
                let next = StreamNext {
                    interceptors,
                    index: index + 1,
                    desc: desc.clone(),
                    terminal,
                };
                interceptor(stream, desc, next)
            }
            None => terminal(stream),
        }
    }
}

impl<M> fmt::Debug for StreamNext<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamNext")
            .field("method", &self.desc.method)
            .field("remaining", &(self.interceptors.len() - self.index))
            .finish()
    }
}

/// An ordered, immutable list of unary interceptors.
pub struct UnaryChain<Req, Resp> {
    interceptors: Arc<[UnaryInterceptor<Req, Resp>]>,
}

impl<Req: Send + 'static, Resp: Send + 'static> UnaryChain<Req, Resp> {
    pub fn new(interceptors: impl IntoIterator<Item = UnaryInterceptor<Req, Resp>>) -> Self {
        Self {
            interceptors: interceptors.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain with `handler` as the terminal stage.
    pub fn invoke(
        &self,
        ctx: Context,
        req: Req,
        info: Arc<CallInfo>,
        handler: UnaryHandler<Req, Resp>,
    ) -> BoxFuture<'static, Result<Resp, Status>> {
        self.invoke_with(ctx, req, info, move |ctx, req| handler(ctx, req))
    }

    /// Run the chain with a one-shot terminal.
    pub fn invoke_with<F>(
        &self,
        ctx: Context,
        req: Req,
        info: Arc<CallInfo>,
        terminal: F,
    ) -> BoxFuture<'static, Result<Resp, Status>>
    where
        F: FnOnce(Context, Req) -> BoxFuture<'static, Result<Resp, Status>> + Send + 'static,
    {
        UnaryNext {
            interceptors: self.interceptors.clone(),
            index: 0,
            info,
            terminal: Box::new(terminal),
        }
        .run(ctx, req)
    }
}

impl<Req, Resp> Clone for UnaryChain<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
        }
    }
}

/// An ordered, immutable list of stream interceptors.
pub struct StreamChain<M> {
    interceptors: Arc<[StreamInterceptor<M>]>,
}

impl<M: Send + 'static> StreamChain<M> {
    pub fn new(interceptors: impl IntoIterator<Item = StreamInterceptor<M>>) -> Self {
        Self {
            interceptors: interceptors.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn invoke(
        &self,
        stream: BoxCallStream<M>,
        desc: Arc<StreamDesc>,
        handler: StreamHandler<M>,
    ) -> BoxFuture<'static, Result<(), Status>> {
        StreamNext {
            interceptors: self.interceptors.clone(),
            index: 0,
            desc,
            terminal: Box::new(move |stream| handler(stream)),
        }
        .run(stream)
    }
}

impl<M> Clone for StreamChain<M> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
        }
    }
}

/// Compose unary interceptors into a single interceptor.
///
/// Execution is left to right, with each interceptor's context passed on to
/// the next; the continuation handed to the composite is the final stage.
pub fn chain_unary<Req, Resp>(
    interceptors: impl IntoIterator<Item = UnaryInterceptor<Req, Resp>>,
) -> UnaryInterceptor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let chain = UnaryChain::new(interceptors);

    if chain.is_empty() {
        return Arc::new(|ctx: Context, req: Req, _info: Arc<CallInfo>, next: UnaryNext<Req, Resp>| {
            next.run(ctx, req)
        });
    }

    Arc::new(move |ctx: Context, req: Req, info: Arc<CallInfo>, next: UnaryNext<Req, Resp>| {
        chain.invoke_with(ctx, req, info, move |ctx, req| next.run(ctx, req))
    })
}

/// Compose stream interceptors into a single interceptor.
pub fn chain_stream<M: Send + 'static>(
    interceptors: impl IntoIterator<Item = StreamInterceptor<M>>,
) -> StreamInterceptor<M> {
    let interceptors: Arc<[StreamInterceptor<M>]> = interceptors.into_iter().collect();

    if interceptors.is_empty() {
        return Arc::new(|stream: BoxCallStream<M>, _desc: Arc<StreamDesc>, next: StreamNext<M>| {
            next.run(stream)
        });
    }

    Arc::new(move |stream: BoxCallStream<M>, desc: Arc<StreamDesc>, next: StreamNext<M>| {
        StreamNext {
            interceptors: interceptors.clone(),
            index: 0,
            desc,
            terminal: Box::new(move |stream| next.run(stream)),
        }
        .run(stream)
    })
}
