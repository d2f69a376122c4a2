//! gRPC client library for the Falco daemon.
//!
//! This crate connects to a Falco gRPC endpoint, either over a local Unix
//! domain socket or over the network with mutual TLS, and hands out the
//! generated service clients for the version and output APIs.
//!
//! # Example
//!
//! ```no_run
//! use falco_client::{Client, Config};
//!
//! # async fn run() -> falco_client::Result<()> {
//! let mut client = Client::connect(&Config::unix_socket("/run/falco/falco.sock")).await?;
//!
//! let mut events = client.subscribe(true).await?;
//! while let Some(event) = events.message().await? {
//!     println!("rule: {}", event.rule);
//! }
//!
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;

pub use client::{
    ChannelConfig, Client, ClientState, OutputServiceClient, OutputStream, VersionServiceClient,
};
pub use config::{Config, ConnectionMode, DEFAULT_GRPC_PORT, DEFAULT_HOSTNAME, ENV_PREFIX};
pub use error::{ClientError, CredentialError, Result};
pub use falco_proto as proto;
