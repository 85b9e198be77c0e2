//! Configuration module for the Scrape Hub
//!
//! Supports loading configuration from TOML files and environment variables.

mod settings;

pub use settings::*;
