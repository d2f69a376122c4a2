//! Client error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Falco client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// TLS material could not be loaded. Not retryable.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Dialing the daemon failed. The caller may try to connect again.
    #[error("error dialing server {target}: {source}")]
    Connection {
        /// Socket path or `host:port` that was dialed.
        target: String,
        /// Transport failure reported by tonic.
        #[source]
        source: tonic::transport::Error,
    },

    /// The client was never connected or has been closed.
    #[error("missing connection for the current client")]
    NotConnected,

    /// The configuration file or environment could not be loaded.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// gRPC status error (server returned an error).
    #[error("gRPC status error: {0}")]
    RpcStatus(#[from] tonic::Status),
}

impl From<figment::Error> for ClientError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failures while assembling TLS client credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Certificate or private key missing, unreadable, or not PEM.
    #[error("error loading the key pair ({}, {}): {reason}", .cert.display(), .key.display())]
    KeyPair {
        /// Client certificate path.
        cert: PathBuf,
        /// Client private key path.
        key: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The CA root file could not be read.
    #[error("error reading the CA root file {}: {source}", .path.display())]
    ReadCaRoot {
        /// CA root path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The CA root file holds no usable PEM certificate.
    #[error("error appending the root CA from {} to the certificate pool", .path.display())]
    AppendCaRoot {
        /// CA root path.
        path: PathBuf,
    },
}

impl CredentialError {
    pub(crate) fn key_pair(cert: &Path, key: &Path, reason: impl Into<String>) -> Self {
        Self::KeyPair {
            cert: cert.to_path_buf(),
            key: key.to_path_buf(),
            reason: reason.into(),
        }
    }
}
