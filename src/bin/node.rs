//! Scrape Node - Main Entry Point
//!
//! Starts a worker node agent that discovers the hub (or uses a configured
//! address), maintains the persistent connection, and processes dispatched
//! scrape requests.

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scrape_hub::config::Settings;
use scrape_hub::node::{NodeAgent, NoopExtractor};

/// Worker node for the scrape hub
#[derive(Parser, Debug)]
#[command(name = "scrape-node", version, about)]
struct Args {
    /// Hub address as host:port; skips broadcast discovery
    #[arg(long)]
    hub: Option<String>,

    /// Node identifier; a fresh UUID when omitted
    #[arg(long)]
    id: Option<String>,

    /// Config file path, without extension
    #[arg(long, default_value = "config")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,scrape_hub=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Settings::default()
    });
    if let Some(hub) = args.hub {
        settings.node.hub_address = Some(hub);
    }
    if let Some(id) = args.id {
        settings.node.node_id = id;
    }

    info!(
        "Starting scrape node {} v{}",
        settings.node.node_id,
        env!("CARGO_PKG_VERSION")
    );
    match &settings.node.hub_address {
        Some(address) => info!("Using configured hub address: {}", address),
        None => info!("No hub address configured, listening for broadcasts"),
    }

    // NoopExtractor is the wiring point for a real browser-backed extractor.
    let agent = NodeAgent::new(
        settings.node,
        settings.discovery,
        Arc::new(NoopExtractor),
    );

    agent.run().await?;
    Ok(())
}
