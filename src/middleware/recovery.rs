//! Panic recovery for server handlers.
//!
//! # Responsibilities
//! - Catch panics raised while a handler (or any later interceptor) builds
//!   or polls its future
//! - Turn the panic into a `Status` via a user-supplied recovery handler, or
//!   an `Internal` status carrying the panic message
//!
//! # Design Decisions
//! - Installed as an interceptor so it can sit anywhere in a chain; the
//!   server pipeline puts it first so it covers the whole chain
//! - The panic never crosses the interceptor boundary

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::error;

use crate::context::Context;
use crate::middleware::chain::{StreamInterceptor, StreamNext, UnaryInterceptor, UnaryNext};
use crate::net::{BoxCallStream, CallInfo, StreamDesc};
use crate::status::Status;

/// Value a panic unwound with.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Converts a caught panic into the status returned to the caller.
pub type RecoveryHandler = Arc<dyn Fn(&Context, PanicPayload) -> Status + Send + Sync>;

/// Recovery interceptor configuration.
#[derive(Clone, Default)]
pub struct RecoveryOptions {
    handler: Option<RecoveryHandler>,
}

impl RecoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `f` to build the status for a caught panic.
    pub fn with_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, PanicPayload) -> Status + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    fn recover(&self, ctx: &Context, method: &str, payload: PanicPayload) -> Status {
        let message = panic_message(payload.as_ref());
        error!(method = %method, panic = %message, "handler panicked, recovered");

        match &self.handler {
            Some(handler) => handler(ctx, payload),
            None => Status::internal(message),
        }
    }
}

impl std::fmt::Debug for RecoveryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOptions")
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

/// Textual form of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(st) = payload.downcast_ref::<Status>() {
        st.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Unary interceptor recovering from panics in the rest of the chain.
pub fn unary_server_interceptor<Req, Resp>(opts: RecoveryOptions) -> UnaryInterceptor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Arc::new(
        move |ctx: Context,
              req: Req,
              info: Arc<CallInfo>,
              next: UnaryNext<Req, Resp>|
              -> BoxFuture<'static, Result<Resp, Status>> {
            let opts = opts.clone();
            let recovery_ctx = ctx.clone();

            // Interceptors and handlers may do work before returning their
            // future, so the call itself is guarded as well as the polling.
            let fut = match panic::catch_unwind(AssertUnwindSafe(|| next.run(ctx, req))) {
                Ok(fut) => fut,
                Err(payload) => {
                    let st = opts.recover(&recovery_ctx, &info.method, payload);
                    return Box::pin(async move { Err(st) });
                }
            };

            Box::pin(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(res) => res,
                    Err(payload) => Err(opts.recover(&recovery_ctx, &info.method, payload)),
                }
            })
        },
    )
}

/// Stream interceptor recovering from panics in the rest of the chain.
pub fn stream_server_interceptor<M: Send + 'static>(opts: RecoveryOptions) -> StreamInterceptor<M> {
    Arc::new(
        move |stream: BoxCallStream<M>,
              desc: Arc<StreamDesc>,
              next: StreamNext<M>|
              -> BoxFuture<'static, Result<(), Status>> {
            let opts = opts.clone();
            let recovery_ctx = stream.context().clone();

            let fut = match panic::catch_unwind(AssertUnwindSafe(|| next.run(stream))) {
                Ok(fut) => fut,
                Err(payload) => {
                    let st = opts.recover(&recovery_ctx, &desc.method, payload);
                    return Box::pin(async move { Err(st) });
                }
            };

            Box::pin(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(res) => res,
                    Err(payload) => Err(opts.recover(&recovery_ctx, &desc.method, payload)),
                }
            })
        },
    )
}
