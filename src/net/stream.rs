//! Bidirectional stream handles.

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::status::Status;

/// A long-lived message channel belonging to one streaming call.
pub trait CallStream<M>: Send {
    /// Context the stream runs under.
    fn context(&self) -> &Context;

    fn send(&mut self, msg: M) -> BoxFuture<'_, Result<(), Status>>;

    /// Next inbound message, `None` once the peer has finished sending.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<M>, Status>>;

    /// Replace the stream's context in place. Streams that cannot do so hand
    /// the context back and get decorated by [`with_context`] instead.
    fn replace_context(&mut self, ctx: Context) -> Result<(), Context> {
        Err(ctx)
    }
}

pub type BoxCallStream<M> = Box<dyn CallStream<M>>;

/// Decorate `stream` so that [`CallStream::context`] returns `ctx`.
///
/// Used by stream interceptors that need to hand a modified context to the
/// rest of the chain. An already decorated stream is updated rather than
/// wrapped a second time.
pub fn with_context<M: Send + 'static>(ctx: Context, mut stream: BoxCallStream<M>) -> BoxCallStream<M> {
    match stream.replace_context(ctx) {
        Ok(()) => stream,
        Err(ctx) => Box::new(ContextStream { inner: stream, ctx }),
    }
}

/// Stream wrapper overriding the inner stream's context.
struct ContextStream<M> {
    inner: BoxCallStream<M>,
    ctx: Context,
}

impl<M: Send + 'static> CallStream<M> for ContextStream<M> {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn send(&mut self, msg: M) -> BoxFuture<'_, Result<(), Status>> {
        self.inner.send(msg)
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<M>, Status>> {
        self.inner.recv()
    }

    fn replace_context(&mut self, ctx: Context) -> Result<(), Context> {
        self.ctx = ctx;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(&'static str);

    struct FakeStream {
        ctx: Context,
        inbound: VecDeque<u32>,
        sent: Vec<u32>,
    }

    impl CallStream<u32> for FakeStream {
        fn context(&self) -> &Context {
            &self.ctx
        }

        fn send(&mut self, msg: u32) -> BoxFuture<'_, Result<(), Status>> {
            self.sent.push(msg);
            Box::pin(async { Ok(()) })
        }

        fn recv(&mut self) -> BoxFuture<'_, Result<Option<u32>, Status>> {
            let next = self.inbound.pop_front();
            Box::pin(async move { Ok(next) })
        }
    }

    #[tokio::test]
    async fn test_with_context_overrides_and_forwards() {
        let inner: BoxCallStream<u32> = Box::new(FakeStream {
            ctx: Context::new(),
            inbound: VecDeque::from([1, 2]),
            sent: Vec::new(),
        });

        let ctx = Context::new().with_value(Marker("first"));
        let mut stream = with_context(ctx, inner);

        assert_eq!(stream.context().value::<Marker>(), Some(&Marker("first")));
        assert_eq!(stream.recv().await.unwrap(), Some(1));
        stream.send(9).await.unwrap();

        let ctx = stream.context().clone().with_value(Marker("second"));
        let stream = with_context(ctx, stream);
        assert_eq!(stream.context().value::<Marker>(), Some(&Marker("second")));
    }
}
