//! Configuration loading from disk.
//!
//! The file maps client names to connection strings:
//!
//! ```toml
//! [clients]
//! users = "grpc://users.internal:443?pool=4"
//! billing = "grpc://:9090?tls=false&timeout=2s"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::ClientConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("client `{name}`: {source}")]
    Invalid {
        name: String,
        #[source]
        source: crate::error::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    clients: BTreeMap<String, String>,
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<BTreeMap<String, ClientConfig>, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;

    file.clients
        .into_iter()
        .map(|(name, dsn)| match ClientConfig::parse(&dsn) {
            Ok(config) => Ok((name, config)),
            Err(source) => Err(ConfigError::Invalid { name, source }),
        })
        .collect()
}

/// Load and parse every client connection string from a TOML file.
pub fn load_config(path: &Path) -> Result<BTreeMap<String, ClientConfig>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let clients = parse_config(&content)?;
    tracing::debug!(path = %path.display(), clients = clients.len(), "client configuration loaded");
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clients() {
        let clients = parse_config(
            r#"
            [clients]
            users = "grpc://users.internal:443?pool=4"
            billing = "grpc://:9090?tls=false"
            "#,
        )
        .unwrap();

        assert_eq!(clients.len(), 2);
        assert_eq!(clients["users"].pool_size, 4);
        assert!(clients["billing"].insecure);
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_config("").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_client_named() {
        let err = parse_config("[clients]\nbroken = \"grpc://host\"\n").unwrap_err();
        match err {
            ConfigError::Invalid { name, .. } => assert_eq!(name, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(parse_config("[clients"), Err(ConfigError::Parse(_))));
    }
}
