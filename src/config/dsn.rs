//! Connection string parsing.
//!
//! Format:
//!
//! ```text
//! grpc://[USERINFO@][HOST]:<PORT>[?OPTIONS][#FRAGMENT]
//! ```
//!
//! Userinfo and fragment are accepted and ignored.
//!
//! Options are given as query parameters:
//!
//! - `tls` (default true): use TLS; `false` selects a plaintext channel.
//! - `tls.skipVerify` (default false): skip certificate verification.
//! - `tls.rootCAs`: path to a PEM file of trusted root CAs; at least one
//!   certificate must decode.
//! - `tls.minVersion` / `tls.maxVersion`: TLS version bounds (wire values).
//! - `tls.serverName`: name checked against the server certificate.
//! - `blocking` (default true): wait for the connection when dialing.
//! - `timeout` (default 10s): dial timeout for blocking dials.
//! - `authority`: `:authority` pseudo-header value.
//! - `userAgent`: user agent for every call.
//! - `maxHeaderListSize` (default 0, unlimited).
//! - `keepAlive.interval` / `keepAlive.timeout`: keepalive tuning.
//! - `headers`: `key:value` header sent with every call; repeat the option
//!   for several headers, e.g. `headers=foo:bar&headers=bar:baz`. The value
//!   may be empty (`no-value:`).
//! - `resolver.scheme`: `passthrough`, `dns` or `unix`.
//! - `defaultServiceConfig`: JSON service config, or one of the shorthands
//!   `lbp-pick_first` / `lbp-round_robin`.
//! - `pool` (default 1): number of connections to dial into a pool.
//!
//! Durations are sequences of decimal numbers with a unit suffix, such as
//! `300ms`, `1.5h` or `2h45m`. Valid units are `ns`, `us` (or `µs`), `ms`,
//! `s`, `m`, `h`.
//!
//! Examples:
//!
//! ```text
//! grpc://example.com:8080
//! grpc://:8080?tls=false
//! grpc://:8080?blocking=false&timeout=5s
//! grpc://example.com:8080?headers=foo:bar&headers=bar:baz
//! ```

use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::ClientConfig;
use crate::error::{Error, Result};

impl ClientConfig {
    /// Parse a connection string into a configuration.
    pub fn parse(dsn: &str) -> Result<ClientConfig> {
        if dsn.is_empty() {
            return Err(invalid("empty dsn"));
        }

        let (scheme, rest) = dsn
            .split_once("://")
            .ok_or_else(|| invalid("missing `grpc://` scheme"))?;
        if scheme != "grpc" {
            return Err(invalid(format!("invalid scheme `{scheme}`, expecting `grpc`")));
        }

        let rest = rest.split_once('#').map_or(rest, |(rest, _fragment)| rest);
        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query)),
            None => (rest, None),
        };
        let authority = authority.strip_suffix('/').unwrap_or(authority);
        // credentials are never used for the connection target
        let authority = authority.rsplit_once('@').map_or(authority, |(_userinfo, host)| host);
        if authority.is_empty() {
            return Err(invalid("host cannot be empty"));
        }
        if authority.contains('/') {
            return Err(invalid("paths are not supported"));
        }

        let (host, port) = split_host_port(authority)?;
        let mut config = ClientConfig {
            host,
            port,
            ..ClientConfig::default()
        };

        if let Some(query) = query {
            for (key, values) in group_query(query) {
                apply_option(&mut config, &key, &values)?;
            }
        }

        Ok(config)
    }
}

impl FromStr for ClientConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ClientConfig::parse(s)
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidDsn(reason.into())
}

fn split_host_port(authority: &str) -> Result<(String, u16)> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 host"))?;
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| invalid("port cannot be empty"))?;
        url::Host::parse(&format!("[{host}]"))
            .map_err(|e| invalid(format!("invalid host `{host}`, details = {e}")))?;
        (host, port)
    } else {
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("port cannot be empty"))?;
        if !host.is_empty() {
            url::Host::parse(host).map_err(|e| invalid(format!("invalid host `{host}`, details = {e}")))?;
        }
        (host, port)
    };

    if port.is_empty() {
        return Err(invalid("port cannot be empty"));
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("port `{port}` is not a number")));
    }
    let port = match port.parse::<u16>() {
        Ok(p) if p > 0 => p,
        _ => return Err(invalid("port is out of range [1, 65535]")),
    };

    Ok((host.to_string(), port))
}

/// Query parameters grouped by key, in order of first appearance.
fn group_query(query: &str) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    grouped
}

/// Decode every PEM certificate in `path`; the file must hold at least one.
fn load_root_cas(path: &str) -> Result<()> {
    let file = File::open(path)
        .map_err(|e| invalid(format!("could not read tls.rootCAs file `{path}`, details = {e}")))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| invalid(format!("failed to append tls.rootCAs certificates `{path}`, details = {e}")))?;

    if certs.is_empty() {
        return Err(invalid(format!("failed to append tls.rootCAs certificates `{path}`")));
    }
    Ok(())
}

fn apply_option(config: &mut ClientConfig, key: &str, values: &[String]) -> Result<()> {
    let first = values.first().map(String::as_str).unwrap_or_default();

    match key {
        "tls" => config.insecure = !parse_bool(key, first)?,
        "tls.skipVerify" => config.tls_mut().skip_verify = parse_bool(key, first)?,
        "tls.rootCAs" => {
            load_root_cas(first)?;
            config.tls_mut().root_cas = Some(first.into());
        }
        "tls.minVersion" => config.tls_mut().min_version = Some(parse_number(key, first)?),
        "tls.maxVersion" => config.tls_mut().max_version = Some(parse_number(key, first)?),
        "tls.serverName" => config.tls_mut().server_name = Some(non_empty(key, first)?),
        "blocking" => config.blocking = parse_bool(key, first)?,
        "timeout" => config.timeout = parse_duration_option(key, first)?,
        "authority" => config.authority = Some(non_empty(key, first)?),
        "userAgent" => config.user_agent = Some(non_empty(key, first)?),
        "maxHeaderListSize" => config.max_header_list_size = parse_number(key, first)?,
        "keepAlive.interval" => config.keep_alive_interval = parse_duration_option(key, first)?,
        "keepAlive.timeout" => config.keep_alive_timeout = parse_duration_option(key, first)?,
        "headers" => {
            config.headers.clear();
            for tuple in values {
                let parts: Vec<&str> = tuple.split(':').collect();
                if parts.len() != 2 {
                    return Err(invalid(format!(
                        "invalid header, must be in the form key:value, got `{tuple}`"
                    )));
                }
                config
                    .headers
                    .insert(parts[0].trim().to_string(), parts[1].trim().to_string());
            }
        }
        "resolver.scheme" => {
            if !matches!(first, "passthrough" | "dns" | "unix") {
                return Err(invalid(format!(
                    "invalid resolver.scheme value, expecting `passthrough`, `dns` or `unix`, got `{first}`"
                )));
            }
            config.resolver_scheme = Some(first.to_string());
        }
        "defaultServiceConfig" => {
            let sc = match first {
                "lbp-pick_first" => r#"{"loadBalancingPolicy":"pick_first"}"#,
                "lbp-round_robin" => r#"{"loadBalancingPolicy":"round_robin"}"#,
                other => other,
            };
            if serde_json::from_str::<serde_json::Value>(sc).is_err() {
                return Err(invalid(format!(
                    "invalid JSON for defaultServiceConfig value, got `{sc}`"
                )));
            }
            config.default_service_config = Some(sc.to_string());
        }
        "pool" => {
            let size: usize = parse_number(key, first)?;
            if size == 0 {
                return Err(invalid("pool must hold at least one connection"));
            }
            config.pool_size = size;
        }
        other => return Err(invalid(format!("unknown client option `{other}`"))),
    }

    Ok(())
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(invalid(format!("{key} cannot be empty")));
    }
    Ok(value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(invalid(format!("invalid {key} value `{value}`"))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| invalid(format!("invalid {key} value, details = {e}")))
}

fn parse_duration_option(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).ok_or_else(|| invalid(format!("invalid {key} duration `{value}`")))
}

/// Parse a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// Negative durations are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_end);

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return None,
        };

        let (whole, frac) = num.split_once('.').unwrap_or((num, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return None;
        }

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut value = whole.checked_mul(scale)?;
        if !frac.is_empty() {
            let digits = &frac[..frac.len().min(18)];
            let fraction: u128 = digits.parse().ok()?;
            value = value.checked_add(fraction * scale / 10u128.pow(digits.len() as u32))?;
        }

        total = total.checked_add(value)?;
        rest = tail;
    }

    u64::try_from(total).ok().map(Duration::from_nanos)
}

/// Split `host:port`. Returns `None` when the input is not exactly that.
pub fn parse_host_and_port(s: &str) -> Option<(String, u16)> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return None;
    }

    let port = parts[1].parse().ok()?;
    Some((parts[0].to_string(), port))
}
