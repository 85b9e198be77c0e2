//! Scrape Hub - Distributed Page-Scraping Coordinator
//!
//! A Rust hub-and-workers system for page scraping, providing:
//! - A connection registry and request dispatcher on the hub
//! - UDP broadcast discovery of the hub's node endpoint
//! - Persistent WebSocket connections with heartbeats per worker node
//! - A node agent with a bounded work queue and an extraction seam
//! - REST submission API

pub mod api;
pub mod config;
pub mod discovery;
pub mod hub;
pub mod metrics;
pub mod models;
pub mod node;

// Re-export commonly used types
pub use config::Settings;
pub use discovery::{HubAddress, HubBroadcaster};
pub use hub::{ConnectionRegistry, NodeServer, PendingTable, RequestDispatcher};
pub use models::{Envelope, ExtractionResult, HubError, HubResult, ScrapeRequest};
pub use node::{NodeAgent, PageExtractor};

/// Version of the scrape-hub
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
