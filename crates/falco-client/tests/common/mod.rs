//! In-process stand-in for the Falco gRPC server, listening on a Unix socket.

#![allow(dead_code)]

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use falco_client::proto::{output, schema, version};
use falco_client::Config;
use futures::{Stream, StreamExt};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

type EventStream = Pin<Box<dyn Stream<Item = Result<output::Response, Status>> + Send>>;

pub const FAKE_VERSION: &str = "0.36.2";

/// Daemon behaviour: a fixed set of buffered events, delivered to every
/// subscriber. Keepalive subscribers then wait forever.
#[derive(Clone, Default)]
pub struct FakeFalco {
    buffered: Arc<Vec<output::Response>>,
    subscriptions: Arc<AtomicUsize>,
}

impl FakeFalco {
    pub fn with_events(events: Vec<output::Response>) -> Self {
        Self {
            buffered: Arc::new(events),
            subscriptions: Arc::default(),
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl output::service_server::Service for FakeFalco {
    #[allow(non_camel_case_types)]
    type subscribeStream = EventStream;

    async fn subscribe(
        &self,
        request: Request<output::Request>,
    ) -> Result<Response<Self::subscribeStream>, Status> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let events: Vec<_> = self.buffered.iter().cloned().map(Ok).collect();
        let drained = futures::stream::iter(events);

        let stream: EventStream = if request.into_inner().keepalive {
            Box::pin(drained.chain(futures::stream::pending()))
        } else {
            Box::pin(drained)
        };
        Ok(Response::new(stream))
    }
}

#[tonic::async_trait]
impl version::service_server::Service for FakeFalco {
    async fn version(
        &self,
        _request: Request<version::Request>,
    ) -> Result<Response<version::Response>, Status> {
        Ok(Response::new(version::Response {
            version: FAKE_VERSION.to_string(),
            major: 0,
            minor: 36,
            patch: 2,
            prerelease: String::new(),
            build: String::new(),
            engine_version: "26".to_string(),
        }))
    }
}

/// A running fake daemon. The server task stops when this is dropped.
pub struct Daemon {
    _dir: TempDir,
    pub socket: PathBuf,
    pub falco: FakeFalco,
    handle: JoinHandle<()>,
}

impl Daemon {
    pub fn spawn(falco: FakeFalco) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("falco.sock");
        let listener = UnixListener::bind(&socket).expect("bind unix socket");
        let incoming = UnixListenerStream::new(listener);

        let server = Server::builder()
            .add_service(output::service_server::ServiceServer::new(falco.clone()))
            .add_service(version::service_server::ServiceServer::new(falco.clone()))
            .serve_with_incoming(incoming);
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Self {
            _dir: dir,
            socket,
            falco,
            handle,
        }
    }

    pub fn config(&self) -> Config {
        Config::unix_socket(&self.socket)
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn event(rule: &str, priority: schema::Priority) -> output::Response {
    output::Response {
        time: Some(prost_types::Timestamp {
            seconds: 1_700_000_000,
            nanos: 0,
        }),
        priority: priority as i32,
        source: schema::Source::Syscall as i32,
        rule: rule.to_string(),
        output: format!("{rule} triggered"),
        hostname: "node-1".to_string(),
        ..Default::default()
    }
}
