//! `dragnet-api` — the capture API service binary.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use dragnet_api::{logging, Server};

/// Dragnet capture API — packet-capture aggregation service.
#[derive(Parser)]
#[command(name = "dragnet-api")]
#[command(author, version, about = "Dragnet capture API service")]
struct Args {
    /// Path to the configuration file; built-in defaults are used when
    /// omitted.
    config: Option<PathBuf>,

    /// Raise the log level to debug (overridden by DRAGNET_LOG).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => dragnet_config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => dragnet_config::default_config().context("building default configuration")?,
    };
    if args.verbose {
        config.log.level = "debug".to_owned();
    }

    if let Err(err) = logging::init(&config.log) {
        eprintln!("failed to initialize logging: {err}");
    }
    info!("init phase done, starting api");

    let server = Server::bind(&config).await.context("starting server")?;

    let mut interrupt = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut user1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = interrupt.recv() => info!("received interrupt, shutting down"),
            _ = terminate.recv() => info!("received terminate, shutting down"),
            _ = user1.recv() => info!("received user signal, shutting down"),
        }
    };

    server.run(shutdown).await;
    info!("serve returned successfully");
    Ok(())
}
