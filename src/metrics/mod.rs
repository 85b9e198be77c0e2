//! Metrics for the Scrape Hub

mod prometheus;

pub use self::prometheus::*;
