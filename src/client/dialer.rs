//! Dialing connections from a [`ClientConfig`].
//!
//! # Responsibilities
//! - Collect user interceptors for the client chains
//! - Append header injection when the configuration carries headers
//! - Dial one connection, or `pool_size` connections behind a pool, through
//!   an external [`Connector`]
//! - Bound blocking dials by the configured timeout

use std::time::Duration;

use futures_util::future::BoxFuture;
use tower::BoxError;
use tracing::{debug, info, warn};

use crate::client::channel::Channel;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::load_balancer::ConnPool;
use crate::middleware::chain::{StreamOpenInterceptor, UnaryInterceptor};
use crate::middleware::headers;
use crate::net::ClientConn;

/// Establishes a single transport connection. The handshake itself lives
/// outside this crate.
pub trait Connector: Send + Sync {
    type Conn: ClientConn;

    fn connect<'a>(&'a self, config: &'a ClientConfig) -> BoxFuture<'a, Result<Self::Conn, BoxError>>;
}

type RequestOf<K> = <<K as Connector>::Conn as ClientConn>::Request;
type ResponseOf<K> = <<K as Connector>::Conn as ClientConn>::Response;
type MessageOf<K> = <<K as Connector>::Conn as ClientConn>::Message;

/// Builder controlling how a configured backend is dialed.
pub struct Dialer<K: Connector> {
    config: ClientConfig,
    connector: K,
    unary: Vec<UnaryInterceptor<RequestOf<K>, ResponseOf<K>>>,
    stream: Vec<StreamOpenInterceptor<MessageOf<K>>>,
}

impl ClientConfig {
    /// Start dialing this configuration with `connector`.
    pub fn dialer<K: Connector>(&self, connector: K) -> Dialer<K> {
        Dialer {
            config: self.clone(),
            connector,
            unary: Vec::new(),
            stream: Vec::new(),
        }
    }
}

impl<K: Connector> Dialer<K> {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Append unary interceptors. They run in the order given, before the
    /// configured header injection.
    pub fn with_unary_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = UnaryInterceptor<RequestOf<K>, ResponseOf<K>>>,
    ) -> Self {
        self.unary.extend(interceptors);
        self
    }

    /// Append stream-open interceptors.
    pub fn with_stream_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = StreamOpenInterceptor<MessageOf<K>>>,
    ) -> Self {
        self.stream.extend(interceptors);
        self
    }

    /// Dial a single connection.
    pub async fn dial(self) -> Result<Channel<K::Conn>> {
        let (unary, stream) = self.chains()?;
        let conn = self.connect_one().await?;

        info!(target_addr = %self.config.target(), "client connection established");
        Ok(Channel::new(conn, unary, stream))
    }

    /// Dial `pool_size` connections and balance calls across them.
    ///
    /// If any dial fails, the connections dialed so far are closed and the
    /// dial error is returned.
    pub async fn dial_pool(self) -> Result<Channel<ConnPool<K::Conn>>> {
        let (unary, stream) = self.chains()?;
        let size = self.config.pool_size.max(1);

        let mut conns = Vec::with_capacity(size);
        for index in 0..size {
            match self.connect_one().await {
                Ok(conn) => conns.push(conn),
                Err(err) => {
                    warn!(index, error = %err, "pool dial failed, closing dialed connections");
                    for (index, conn) in conns.iter().enumerate() {
                        if let Err(e) = conn.close().await {
                            warn!(index, error = %e, "failed to close connection after dial failure");
                        }
                    }
                    return Err(err);
                }
            }
        }

        let pool = ConnPool::new(conns)?;
        info!(target_addr = %self.config.target(), size, "client connection pool established");
        Ok(Channel::new(pool, unary, stream))
    }

    #[allow(clippy::type_complexity)]
    fn chains(
        &self,
    ) -> Result<(
        Vec<UnaryInterceptor<RequestOf<K>, ResponseOf<K>>>,
        Vec<StreamOpenInterceptor<MessageOf<K>>>,
    )> {
        let mut unary = self.unary.clone();
        let mut stream = self.stream.clone();

        if !self.config.headers.is_empty() {
            unary.push(headers::unary_client_interceptor(&self.config.headers)?);
            stream.push(headers::stream_client_interceptor(&self.config.headers)?);
        }

        Ok((unary, stream))
    }

    async fn connect_one(&self) -> Result<K::Conn> {
        let timeout = self.config.timeout;
        let connect = self.connector.connect(&self.config);

        if !self.config.blocking || timeout == Duration::ZERO {
            return connect.await.map_err(Error::Dial);
        }

        debug!(target_addr = %self.config.target(), ?timeout, "blocking dial");
        match tokio::time::timeout(timeout, connect).await {
            Ok(res) => res.map_err(Error::Dial),
            Err(_) => Err(Error::DialTimeout(timeout)),
        }
    }
}

impl<K: Connector> std::fmt::Debug for Dialer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialer")
            .field("target", &self.config.target())
            .field("unary_interceptors", &self.unary.len())
            .field("stream_interceptors", &self.stream.len())
            .finish()
    }
}
