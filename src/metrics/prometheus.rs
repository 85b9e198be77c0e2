//! Prometheus metrics integration

use actix_web::{get, HttpResponse};
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram,
    HistogramOpts, IntCounter, IntGauge, TextEncoder,
};

// Define metrics
static DISPATCH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "dispatch_total",
        "Total number of requests dispatched to nodes"
    ))
    .expect("Failed to create dispatch counter")
});

static DISPATCH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "dispatch_failures_total",
        "Dispatches that failed (no nodes, node lost, timeout, rejection)"
    ))
    .expect("Failed to create dispatch failures counter")
});

static DISPATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(HistogramOpts::new(
        "dispatch_duration_seconds",
        "Time from dispatch to resolution in seconds"
    ))
    .expect("Failed to create dispatch duration histogram")
});

static CONNECTED_NODES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "connected_nodes",
        "Number of nodes currently holding a live connection"
    ))
    .expect("Failed to create connected nodes gauge")
});

static HEARTBEATS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "heartbeats_total",
        "Total number of heartbeats received from nodes"
    ))
    .expect("Failed to create heartbeats counter")
});

static RESPONSES_DISCARDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "responses_discarded_total",
        "Responses with no matching pending request (late or unknown)"
    ))
    .expect("Failed to create discarded responses counter")
});

/// Initialize all metrics
pub fn init_metrics() {
    // Force lazy initialization
    Lazy::force(&DISPATCH_TOTAL);
    Lazy::force(&DISPATCH_FAILURES_TOTAL);
    Lazy::force(&DISPATCH_DURATION);
    Lazy::force(&CONNECTED_NODES);
    Lazy::force(&HEARTBEATS_TOTAL);
    Lazy::force(&RESPONSES_DISCARDED_TOTAL);
}

/// Record a dispatched request
pub fn record_dispatch() {
    DISPATCH_TOTAL.inc();
}

/// Record a failed dispatch
pub fn record_dispatch_failure() {
    DISPATCH_FAILURES_TOTAL.inc();
}

/// Record time from dispatch to resolution
pub fn record_dispatch_duration(duration_secs: f64) {
    DISPATCH_DURATION.observe(duration_secs);
}

/// Set the number of connected nodes
pub fn set_connected_nodes(count: i64) {
    CONNECTED_NODES.set(count);
}

/// Record a received heartbeat
pub fn record_heartbeat() {
    HEARTBEATS_TOTAL.inc();
}

/// Record a response that matched no pending request
pub fn record_response_discarded() {
    RESPONSES_DISCARDED_TOTAL.inc();
}

/// Prometheus metrics endpoint
#[get("/metrics")]
pub async fn metrics_endpoint() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("Failed to encode metrics: {}", e));
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init_metrics();

        // Just verify they can be recorded
        record_dispatch();
        record_dispatch_duration(0.1);
        set_connected_nodes(3);
        record_heartbeat();
    }
}
