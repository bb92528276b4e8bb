//! Shared in-memory transport for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::HeaderMap;
use rpc_dispatch::{BoxCallStream, CallInfo, CallStream, ClientConfig, ClientConn, Connector, Context, Status, StreamDesc};
use tower::BoxError;

/// Observable state of one mock connection.
#[derive(Debug, Default)]
pub struct ConnState {
    pub name: String,
    pub fail_close: bool,
    pub invocations: AtomicUsize,
    pub streams: AtomicUsize,
    pub closes: AtomicUsize,
    pub last_metadata: Mutex<HeaderMap>,
}

impl ConnState {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ..Default::default()
        })
    }

    pub fn failing_close(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fail_close: true,
            ..Default::default()
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Connection answering `"<name>:<request>"`. A request of `"fail"` is
/// answered with `Unavailable` carrying the connection name.
#[derive(Debug)]
pub struct MockConn {
    pub state: Arc<ConnState>,
}

impl MockConn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: ConnState::new(name),
        }
    }

    pub fn from_state(state: Arc<ConnState>) -> Self {
        Self { state }
    }
}

impl ClientConn for MockConn {
    type Request = String;
    type Response = String;
    type Message = String;

    fn invoke(&self, ctx: Context, _info: Arc<CallInfo>, req: String) -> BoxFuture<'_, Result<String, Status>> {
        Box::pin(async move {
            self.state.invocations.fetch_add(1, Ordering::SeqCst);
            *self.state.last_metadata.lock().unwrap() = ctx.metadata().clone();

            if req == "fail" {
                return Err(Status::unavailable(self.state.name.clone()));
            }
            Ok(format!("{}:{}", self.state.name, req))
        })
    }

    fn new_stream(&self, ctx: Context, _desc: Arc<StreamDesc>) -> BoxFuture<'_, Result<BoxCallStream<String>, Status>> {
        Box::pin(async move {
            self.state.streams.fetch_add(1, Ordering::SeqCst);
            *self.state.last_metadata.lock().unwrap() = ctx.metadata().clone();

            let (stream, _outbox) = MockStream::new(ctx, [format!("hello from {}", self.state.name)]);
            Ok(stream)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        Box::pin(async move {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_close {
                return Err(format!("{} refused to close", self.state.name).into());
            }
            Ok(())
        })
    }
}

/// Stream yielding scripted inbound messages and recording what is sent.
pub struct MockStream {
    ctx: Context,
    inbound: VecDeque<String>,
    outbox: Arc<Mutex<Vec<String>>>,
}

impl MockStream {
    pub fn new<I, S>(ctx: Context, inbound: I) -> (BoxCallStream<String>, Arc<Mutex<Vec<String>>>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let stream: BoxCallStream<String> = Box::new(MockStream {
            ctx,
            inbound: inbound.into_iter().map(Into::into).collect(),
            outbox: outbox.clone(),
        });
        (stream, outbox)
    }
}

impl CallStream<String> for MockStream {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn send(&mut self, msg: String) -> BoxFuture<'_, Result<(), Status>> {
        self.outbox.lock().unwrap().push(msg);
        Box::pin(async { Ok(()) })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, Status>> {
        let next = self.inbound.pop_front();
        Box::pin(async move { Ok(next) })
    }
}

/// Connector handing out [`MockConn`]s named `c0`, `c1`, ...
#[derive(Debug, Default)]
pub struct MockConnector {
    pub delay: Duration,
    pub fail_at: Option<usize>,
    pub attempts: AtomicUsize,
    pub dialed: Mutex<Vec<Arc<ConnState>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing_at(attempt: usize) -> Self {
        Self {
            fail_at: Some(attempt),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn dialed(&self) -> Vec<Arc<ConnState>> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Connector for &MockConnector {
    type Conn = MockConn;

    fn connect<'a>(&'a self, _config: &'a ClientConfig) -> BoxFuture<'a, Result<MockConn, BoxError>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(attempt) {
                return Err(format!("dial {} refused", attempt).into());
            }

            let state = ConnState::new(format!("c{}", attempt));
            self.dialed.lock().unwrap().push(state.clone());
            Ok(MockConn::from_state(state))
        })
    }
}

/// Insecure configuration for `localhost:50051`.
pub fn local_config() -> ClientConfig {
    ClientConfig {
        host: "localhost".into(),
        port: 50051,
        insecure: true,
        ..Default::default()
    }
}
