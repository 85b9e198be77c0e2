//! API module for the Scrape Hub
//!
//! REST endpoints for request submission, node inspection, and health.

mod health;
mod responses;
mod rest;

pub use health::*;
pub use responses::*;
pub use rest::*;
