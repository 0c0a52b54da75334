use anyhow::Context;
use clap::Parser;
use mirage_server::config::MockServerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration-driven REST and GraphQL mock server
#[derive(Parser, Debug)]
#[command(name = "mirage", version, about)]
struct Args {
    /// Declaration file (YAML or JSON)
    #[arg(short, long, env = "MIRAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the file)
    #[arg(short, long, env = "MIRAGE_PORT")]
    port: Option<u16>,

    /// Prefix for every endpoint (overrides the file)
    #[arg(long)]
    base_url: Option<String>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MockServerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            tracing::warn!("no config given, every request will be answered with 404");
            MockServerConfig::default()
        }
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let server = config.compile().context("invalid declarations")?;
    if let Some(rest) = server.rest() {
        tracing::info!(
            base_url = rest.base_url(),
            endpoints = rest.endpoints().len(),
            "REST declarations loaded"
        );
    }
    if let Some(graphql) = server.graphql() {
        tracing::info!(
            base_url = graphql.base_url(),
            endpoints = graphql.endpoints().len(),
            "GraphQL declarations loaded"
        );
    }

    let addr: SocketAddr = format!("{}:{}", args.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, config.port))?;
    let (local, shutdown) = server.spawn(addr).await?;
    tracing::info!(address = %local, "mirage v{} ready", env!("CARGO_PKG_VERSION"));

    tokio::signal::ctrl_c().await?;
    let _ = shutdown.send(());
    tracing::info!("Shutdown complete");
    Ok(())
}
