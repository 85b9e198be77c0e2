//! Scrape Hub - Main Entry Point
//!
//! Starts the node WebSocket endpoint, the discovery broadcaster, and the
//! external HTTP API.

use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scrape_hub::api::{configure_routes, ApiState, AppState};
use scrape_hub::config::Settings;
use scrape_hub::discovery::{detect_local_addr, HubAddress, HubBroadcaster};
use scrape_hub::hub::{ConnectionRegistry, DispatcherConfig, NodeServer, RequestDispatcher};
use scrape_hub::metrics::{init_metrics, metrics_endpoint};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging with RUST_LOG environment variable support
    // Default: info level for scrape_hub, warn for everything else
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

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Settings::default()
    });

    info!("Starting Scrape Hub v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP API: {}:{}", settings.hub.host, settings.hub.http_port);
    info!(
        "Node endpoint: {}:{}",
        settings.hub.host, settings.hub.ws_port
    );

    // Initialize metrics
    init_metrics();

    // Registry and dispatcher, shared by the node server and the API
    let registry = ConnectionRegistry::new();
    let dispatcher = RequestDispatcher::new(
        registry,
        DispatcherConfig {
            timeout: Duration::from_secs(settings.dispatch.timeout_secs),
            heartbeat_ack: settings.hub.heartbeat_ack,
        },
    );

    // Node WebSocket endpoint as a background task
    let node_server = NodeServer::new(dispatcher.clone(), &settings.hub.host, settings.hub.ws_port);
    actix_web::rt::spawn(async move {
        if let Err(e) = node_server.run().await {
            error!("Node server error: {}", e);
        }
    });

    // Discovery broadcaster: advertise the node endpoint
    let mut broadcast_handle = None;
    if settings.discovery.enabled {
        let advertise_host = settings
            .hub
            .advertise_host
            .clone()
            .or_else(|| detect_local_addr().map(|ip| ip.to_string()))
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let record = HubAddress::new(advertise_host, settings.hub.ws_port);
        let broadcaster = Arc::new(HubBroadcaster::new(&settings.discovery, record));
        broadcast_handle = Some(broadcaster.start());
    }

    // Create application state for the HTTP server
    let app_state = AppState::new();
    let api_state = ApiState::new(dispatcher);

    let http_addr = format!("{}:{}", settings.hub.host, settings.hub.http_port);
    info!("Starting HTTP server on {}", http_addr);

    let server = HttpServer::new(move || {
        App::new()
            // Add shared state
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(api_state.clone()))
            // Add middleware
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            // Add routes
            .configure(configure_routes)
            // Add metrics endpoint
            .service(metrics_endpoint)
    })
    .workers(settings.hub.workers)
    .bind(&http_addr)?
    .run();

    // Keep the broadcaster alive for the lifetime of the server
    let _broadcast_handle = broadcast_handle;

    server.await
}
