//! Connection configuration for the Falco gRPC endpoint.
//!
//! A [`Config`] describes one of two ways to reach the daemon:
//! - a local Unix domain socket (no transport security), or
//! - a `hostname:port` endpoint secured with mutual TLS.
//!
//! A non-empty `unix_socket_path` always wins. In that case the TLS fields are
//! never looked at, whether they are valid, missing, or garbage.
//!
//! # Loading
//!
//! Embedding applications usually build a [`Config`] directly. For tools that
//! want file/env driven configuration, [`Config::load_from`] merges:
//! 1. Library defaults (`localhost:5060`, no TLS material, no socket)
//! 2. A TOML file
//! 3. `FALCO_`-prefixed environment variables (e.g. `FALCO_UNIX_SOCKET_PATH`)
//!
//! ```toml
//! hostname = "falco.internal"
//! port = 5060
//! cert_file = "/etc/falco/certs/client.crt"
//! key_file = "/etc/falco/certs/client.key"
//! ca_root_file = "/etc/falco/certs/ca.crt"
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default port of Falco's gRPC server.
pub const DEFAULT_GRPC_PORT: u16 = 5060;

/// Default hostname for network connections.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FALCO_";

/// Configuration for connecting to a Falco gRPC server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server hostname; also the name verified against the server certificate.
    pub hostname: String,
    /// Server port.
    pub port: u16,
    /// PEM client certificate.
    pub cert_file: PathBuf,
    /// PEM client private key.
    pub key_file: PathBuf,
    /// PEM bundle of CA certificates trusted to sign the server certificate.
    pub ca_root_file: PathBuf,
    /// Local socket of the daemon. Takes priority over every other field.
    pub unix_socket_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_GRPC_PORT,
            cert_file: PathBuf::new(),
            key_file: PathBuf::new(),
            ca_root_file: PathBuf::new(),
            unix_socket_path: None,
        }
    }
}

/// How the client reaches the daemon, resolved once from a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Plaintext gRPC over a Unix domain socket.
    LocalSocket {
        /// Socket path.
        path: PathBuf,
    },
    /// gRPC over TCP with mutual TLS.
    NetworkTls {
        /// Server hostname and expected certificate name.
        hostname: String,
        /// Server port.
        port: u16,
        /// PEM client certificate.
        cert_file: PathBuf,
        /// PEM client private key.
        key_file: PathBuf,
        /// PEM CA root bundle.
        ca_root_file: PathBuf,
    },
}

impl ConnectionMode {
    /// The dial target: the socket path, or `hostname:port`.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::LocalSocket { path } => path.display().to_string(),
            Self::NetworkTls { hostname, port, .. } => format!("{hostname}:{port}"),
        }
    }
}

impl Config {
    /// Configuration for a local Unix socket connection.
    #[must_use]
    pub fn unix_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            unix_socket_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Configuration for a mutual-TLS network connection.
    #[must_use]
    pub fn network(
        hostname: impl Into<String>,
        port: u16,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        ca_root_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            ca_root_file: ca_root_file.into(),
            unix_socket_path: None,
        }
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::figment()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self> {
        let config = Self::figment().merge(Env::prefixed(ENV_PREFIX)).extract()?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    /// The socket path, if one is set and non-empty.
    #[must_use]
    pub fn socket_path(&self) -> Option<&Path> {
        self.unix_socket_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Decide how to connect.
    ///
    /// No field is validated here. Local socket mode never looks at the TLS
    /// fields; network mode loads credentials before anything else, and an
    /// unusable `hostname:port` is only reported when it is dialed.
    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        if let Some(path) = self.socket_path() {
            return ConnectionMode::LocalSocket {
                path: path.to_path_buf(),
            };
        }

        ConnectionMode::NetworkTls {
            hostname: self.hostname.clone(),
            port: self.port,
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            ca_root_file: self.ca_root_file.clone(),
        }
    }
}
