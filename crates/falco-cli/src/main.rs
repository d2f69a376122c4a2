//! CLI entry point for querying a Falco daemon over gRPC.
//!
//! # Usage
//!
//! Print the daemon version over the local socket:
//! ```bash
//! falco-grpc --unix-socket /run/falco/falco.sock version
//! ```
//!
//! Tail alerts from a remote daemon with mutual TLS:
//! ```bash
//! falco-grpc --hostname falco.internal --cert client.crt --key client.key \
//!     --ca-root ca.crt subscribe --keepalive
//! ```
//!
//! Connection settings come from `--config` (TOML), then `FALCO_*`
//! environment variables, then flags; later sources win.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use falco_client::proto::output;
use falco_client::{Client, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "falco-grpc")]
#[command(about = "Query and tail a Falco daemon over gRPC", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// TOML file with connection settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local Falco socket; when set, all TLS options are ignored
    #[arg(long, global = true)]
    unix_socket: Option<PathBuf>,

    /// Falco gRPC hostname (also the expected certificate name)
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// Falco gRPC port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// PEM client certificate
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    /// PEM client private key
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// PEM CA root bundle
    #[arg(long, global = true)]
    ca_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the daemon version
    Version,

    /// Print alerts as they arrive
    Subscribe {
        /// Wait for new events instead of stopping after buffered ones
        #[arg(long)]
        keepalive: bool,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },
}

impl ConnectionArgs {
    fn resolve(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::from_env()?,
        };

        if let Some(socket) = self.unix_socket {
            config.unix_socket_path = Some(socket);
        }
        if let Some(hostname) = self.hostname {
            config.hostname = hostname;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(cert) = self.cert {
            config.cert_file = cert;
        }
        if let Some(key) = self.key {
            config.key_file = key;
        }
        if let Some(ca_root) = self.ca_root {
            config.ca_root_file = ca_root;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.connection.resolve()?;
    let mut client = Client::connect(&config)
        .await
        .context("unable to create a Falco client")?;

    let result = match cli.command {
        Commands::Version => print_version(&client).await,
        Commands::Subscribe { keepalive, json } => tail(&client, keepalive, json).await,
    };

    client.close()?;
    result
}

async fn print_version(client: &Client) -> Result<()> {
    let version = client.version().await.context("could not get version")?;
    println!("{}", version.version);
    if !version.engine_version.is_empty() {
        println!("engine: {}", version.engine_version);
    }
    Ok(())
}

async fn tail(client: &Client, keepalive: bool, json: bool) -> Result<()> {
    let mut events = client
        .subscribe(keepalive)
        .await
        .context("could not subscribe")?;
    tracing::info!(keepalive, "Subscribed to Falco outputs");

    loop {
        let next = tokio::select! {
            next = events.message() => next.context("error receiving event")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing stream");
                break;
            }
        };
        let Some(event) = next else {
            break;
        };

        if json {
            println!("{}", to_json(&event));
        } else {
            let time = event
                .timestamp()
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("{time} {} {}", event.priority(), event.rule);
        }
    }
    Ok(())
}

fn to_json(event: &output::Response) -> serde_json::Value {
    serde_json::json!({
        "time": event.timestamp().map(|ts| ts.to_rfc3339()),
        "priority": event.priority().to_string(),
        "source": event.source().to_string(),
        "rule": event.rule,
        "output": event.output,
        "output_fields": event.output_fields,
        "hostname": event.hostname,
    })
}
