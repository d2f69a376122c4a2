//! gRPC client for communicating with the Falco daemon.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──connect()──> Connected ──close()──> Closed
//! ```
//!
//! Only a `Connected` client hands out sub-clients or can be closed. There is
//! no way back from `Closed`; connect again to get a new client.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use falco_proto::{output, version};
use tokio::net::UnixStream;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint, Uri};
use tower::service_fn;

use crate::config::{Config, ConnectionMode};
use crate::credentials;
use crate::error::{ClientError, Result};

/// Generated client for `falco.version.service`.
pub type VersionServiceClient = version::service_client::ServiceClient<Channel>;

/// Generated client for `falco.output.service`.
pub type OutputServiceClient = output::service_client::ServiceClient<Channel>;

/// Server stream returned by `subscribe`.
pub type OutputStream = tonic::Streaming<output::Response>;

/// Placeholder authority for Unix socket channels. The connector ignores it.
const UNIX_SOCKET_AUTHORITY: &str = "http://[::]:5060";

/// gRPC channel options passed through to the transport.
///
/// Nothing is set by default: no timeouts, no HTTP/2 keepalive, and the
/// connection is established before `connect` returns.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Connection timeout (how long to wait for the initial connection)
    pub connect_timeout: Option<Duration>,
    /// HTTP/2 keepalive interval (how often to send keepalive pings)
    pub keepalive_interval: Option<Duration>,
    /// Keepalive timeout (how long to wait for keepalive response)
    pub keepalive_timeout: Option<Duration>,
    /// Whether to send keepalive pings even when idle
    pub keepalive_while_idle: bool,
    /// Defer connecting until the first RPC. Dial failures then surface as
    /// RPC errors instead of from `connect`.
    pub lazy: bool,
}

impl ChannelConfig {
    /// Options that defer connecting until the first RPC.
    #[must_use]
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    fn apply(&self, mut endpoint: Endpoint) -> Endpoint {
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(interval) = self.keepalive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }
        if let Some(timeout) = self.keepalive_timeout {
            endpoint = endpoint.keep_alive_timeout(timeout);
        }
        endpoint.keep_alive_while_idle(self.keepalive_while_idle)
    }
}

/// Where a [`Client`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Never connected.
    Uninitialized,
    /// Holding a live connection.
    Connected,
    /// Connection released by [`Client::close`].
    Closed,
}

impl ClientState {
    /// Returns a short status label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Connected => "Connected",
            Self::Closed => "Closed",
        }
    }
}

/// Connection to a Falco gRPC server.
///
/// The version and output sub-clients are created on first use and then
/// reused. Both share the client's single connection. A connected client is
/// `Send + Sync`; concurrent first access still builds each sub-client once.
///
/// `Client::default()` is a never-connected client: every operation on it
/// fails with [`ClientError::NotConnected`].
#[derive(Debug, Default)]
pub struct Client {
    channel: Option<Channel>,
    closed: bool,
    version: OnceLock<VersionServiceClient>,
    output: OnceLock<OutputServiceClient>,
}

impl Client {
    /// Connect to the Falco daemon described by `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::connect_with_config(config, &ChannelConfig::default()).await
    }

    /// Connect with custom channel options.
    ///
    /// In Unix socket mode nothing but the socket path is read. In network
    /// mode the key pair and CA root are loaded first; any credential problem
    /// is returned before a connection is attempted.
    pub async fn connect_with_config(config: &Config, channel: &ChannelConfig) -> Result<Self> {
        let mode = config.mode();
        tracing::debug!(
            target_addr = %mode.target(),
            lazy = channel.lazy,
            "Falco client connecting"
        );

        let conn = match &mode {
            ConnectionMode::LocalSocket { path } => dial_unix_socket(path, channel).await?,
            ConnectionMode::NetworkTls {
                hostname,
                port,
                cert_file,
                key_file,
                ca_root_file,
            } => {
                let tls =
                    credentials::client_tls_config(hostname, cert_file, key_file, ca_root_file)
                        .map_err(|e| {
                            tracing::warn!(error = %e, "Falco client credentials rejected");
                            e
                        })?;
                dial_network(hostname, *port, tls, channel).await?
            }
        };

        tracing::debug!(target_addr = %mode.target(), "Falco client connected");
        Ok(Self::from_channel(conn))
    }

    /// Wrap an already established channel.
    #[must_use]
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            ..Self::default()
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        match (&self.channel, self.closed) {
            (Some(_), _) => ClientState::Connected,
            (None, true) => ClientState::Closed,
            (None, false) => ClientState::Uninitialized,
        }
    }

    /// Returns true while the client holds a connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Client for the Falco version API.
    ///
    /// Built on first call; later calls return the same instance. Clone it to
    /// issue calls, since generated clients take `&mut self`.
    pub fn version_client(&self) -> Result<&VersionServiceClient> {
        let channel = self.channel()?;
        Ok(self.version.get_or_init(|| {
            tracing::debug!("Creating version service client");
            VersionServiceClient::new(channel.clone())
        }))
    }

    /// Client for Falco outputs. Use `subscribe` on it to receive events.
    ///
    /// Built on first call; later calls return the same instance.
    pub fn output_client(&self) -> Result<&OutputServiceClient> {
        let channel = self.channel()?;
        Ok(self.output.get_or_init(|| {
            tracing::debug!("Creating output service client");
            OutputServiceClient::new(channel.clone())
        }))
    }

    /// Subscribe to Falco output events.
    ///
    /// With `keepalive` the stream waits for new events until the caller
    /// drops it or the connection goes away. Without it the stream ends once
    /// the events already buffered on the daemon have been delivered.
    pub async fn subscribe(&self, keepalive: bool) -> Result<OutputStream> {
        let mut output = self.output_client()?.clone();
        let response = output
            .subscribe(output::Request { keepalive })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, keepalive, "Falco subscribe failed");
                e
            })?;
        Ok(response.into_inner())
    }

    /// Query the daemon version.
    pub async fn version(&self) -> Result<version::Response> {
        let mut client = self.version_client()?.clone();
        let response = client.version(version::Request {}).await?;
        Ok(response.into_inner())
    }

    /// Close the connection to the Falco gRPC server.
    ///
    /// The stored connection and both sub-clients are released; the transport
    /// shuts down once clones handed out by the sub-client accessors are
    /// dropped too. Close exactly once: closing a closed (or never connected)
    /// client returns [`ClientError::NotConnected`].
    pub fn close(&mut self) -> Result<()> {
        let channel = self.channel.take().ok_or(ClientError::NotConnected)?;
        self.version.take();
        self.output.take();
        self.closed = true;
        drop(channel);
        tracing::debug!("Falco client closed");
        Ok(())
    }

    fn channel(&self) -> Result<&Channel> {
        self.channel.as_ref().ok_or(ClientError::NotConnected)
    }
}

/// Plaintext channel over a Unix domain socket.
async fn dial_unix_socket(path: &Path, options: &ChannelConfig) -> Result<Channel> {
    let endpoint = options.apply(Endpoint::from_static(UNIX_SOCKET_AUTHORITY));
    let socket = path.to_path_buf();
    let connector = service_fn(move |_: Uri| UnixStream::connect(socket.clone()));

    if options.lazy {
        return Ok(endpoint.connect_with_connector_lazy(connector));
    }

    endpoint
        .connect_with_connector(connector)
        .await
        .map_err(|source| {
            tracing::warn!(socket = %path.display(), error = %source, "Falco dial failed");
            ClientError::Connection {
                target: path.display().to_string(),
                source,
            }
        })
}

/// Mutual-TLS channel to `hostname:port`.
async fn dial_network(
    hostname: &str,
    port: u16,
    tls: ClientTlsConfig,
    options: &ChannelConfig,
) -> Result<Channel> {
    let target = format!("{hostname}:{port}");
    let connection_error = |source: tonic::transport::Error| {
        tracing::warn!(target_addr = %target, error = %source, "Falco dial failed");
        ClientError::Connection {
            target: target.clone(),
            source,
        }
    };

    let endpoint = Endpoint::from_shared(format!("https://{}:{port}", uri_host(hostname)))
        .and_then(|endpoint| endpoint.tls_config(tls))
        .map_err(connection_error)?;
    let endpoint = options.apply(endpoint);

    if options.lazy {
        return Ok(endpoint.connect_lazy());
    }
    endpoint.connect().await.map_err(connection_error)
}

/// Bracket bare IPv6 literals for use in a URI authority.
fn uri_host(hostname: &str) -> String {
    if hostname.contains(':') && !hostname.starts_with('[') {
        format!("[{hostname}]")
    } else {
        hostname.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_is_uninitialized() {
        let client = Client::default();
        assert_eq!(client.state(), ClientState::Uninitialized);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_uninitialized_client_rejects_everything() {
        let mut client = Client::default();
        assert!(matches!(
            client.version_client(),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.output_client(),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(client.close(), Err(ClientError::NotConnected)));
        assert_eq!(client.state(), ClientState::Uninitialized);
    }

    #[tokio::test]
    async fn test_uninitialized_client_rejects_rpcs() {
        let client = Client::default();
        assert!(matches!(
            client.subscribe(false).await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.version().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_lazy_channel_memoizes_sub_clients() {
        let channel = Endpoint::from_static("http://127.0.0.1:5060").connect_lazy();
        let client = Client::from_channel(channel);
        assert_eq!(client.state(), ClientState::Connected);

        let first = client.output_client().unwrap();
        let second = client.output_client().unwrap();
        assert!(std::ptr::eq(first, second));

        let first = client.version_client().unwrap();
        let second = client.version_client().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn test_close_then_everything_fails() {
        let channel = Endpoint::from_static("http://127.0.0.1:5060").connect_lazy();
        let mut client = Client::from_channel(channel);
        client.output_client().unwrap();

        client.close().unwrap();
        assert_eq!(client.state(), ClientState::Closed);
        assert!(matches!(client.close(), Err(ClientError::NotConnected)));
        assert!(matches!(
            client.output_client(),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.version_client(),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ClientState::Uninitialized.label(), "Uninitialized");
        assert_eq!(ClientState::Connected.label(), "Connected");
        assert_eq!(ClientState::Closed.label(), "Closed");
    }

    #[test]
    fn test_uri_host_brackets_ipv6() {
        assert_eq!(uri_host("::1"), "[::1]");
        assert_eq!(uri_host("[::1]"), "[::1]");
        assert_eq!(uri_host("falco.local"), "falco.local");
    }

    #[test]
    fn test_channel_config_defaults() {
        let config = ChannelConfig::default();
        assert!(config.connect_timeout.is_none());
        assert!(!config.lazy);
        assert!(ChannelConfig::lazy().lazy);
    }
}
