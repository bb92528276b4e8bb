//! Client configuration record.
//!
//! Produced by the DSN parser (or built by hand) and consumed by the dialer.
//! All types derive Serde traits so a resolved configuration can be printed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Connection details for one client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hostname, e.g. `example.com`. Empty means `localhost` to most dialers.
    pub host: String,

    /// TCP port, 1-65535.
    pub port: u16,

    /// Use an insecure (plaintext) channel.
    pub insecure: bool,

    /// TLS details when `insecure` is false.
    pub tls: Option<TlsConfig>,

    /// Value for the `:authority` pseudo-header.
    pub authority: Option<String>,

    /// User agent sent with every call.
    pub user_agent: Option<String>,

    /// Headers attached to every call.
    pub headers: BTreeMap<String, String>,

    /// Maximum uncompressed header list size accepted, 0 = unlimited.
    pub max_header_list_size: u32,

    /// Idle time before the client pings the server. Zero = never.
    pub keep_alive_interval: Duration,

    /// How long to wait for a keepalive ping response. Zero = transport default.
    pub keep_alive_timeout: Duration,

    /// Wait for the connection to be established when dialing.
    pub blocking: bool,

    /// Dial timeout, only used when `blocking` is set.
    pub timeout: Duration,

    /// Name resolver: `passthrough`, `dns` or `unix`.
    pub resolver_scheme: Option<String>,

    /// JSON service config handed to the transport.
    pub default_service_config: Option<String>,

    /// Number of connections to dial when building a pool.
    pub pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            insecure: false,
            tls: None,
            authority: None,
            user_agent: None,
            headers: BTreeMap::new(),
            max_header_list_size: 0,
            keep_alive_interval: Duration::ZERO,
            keep_alive_timeout: Duration::ZERO,
            blocking: true,
            timeout: Duration::from_secs(10),
            resolver_scheme: None,
            default_service_config: None,
            pool_size: 1,
        }
    }
}

impl ClientConfig {
    /// Dial target, `[scheme:///]host:port`.
    pub fn target(&self) -> String {
        match &self.resolver_scheme {
            Some(scheme) => format!("{}:///{}:{}", scheme, self.host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Mutable access to the TLS section, creating it on first use.
    pub fn tls_mut(&mut self) -> &mut TlsConfig {
        self.tls.get_or_insert_with(TlsConfig::default)
    }
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Skip certificate verification.
    pub skip_verify: bool,

    /// PEM file with trusted root CAs; the host's roots are used when unset.
    pub root_cas: Option<PathBuf>,

    /// Minimum TLS version (wire value, e.g. 0x0303 for 1.2).
    pub min_version: Option<u16>,

    /// Maximum TLS version.
    pub max_version: Option<u16>,

    /// Name checked against the server certificate.
    pub server_name: Option<String>,
}
