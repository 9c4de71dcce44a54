//! Prometheus metrics for RPC nodes.
//!
//! All metrics follow the naming convention: `node_<area>_<metric>_<unit>`
//!
//! - `node_rpc_calls_total{outcome}`: outbound calls by outcome
//! - `node_rpc_pending_calls`: calls awaiting a reply
//! - `node_dispatch_requests_total{operation,outcome}`: inbound requests
//! - `node_dispatch_duration_seconds{operation}`: handler latency

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::TelemetryError;

lazy_static! {
    /// Node metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Outbound RPC calls by outcome
    pub static ref RPC_CALLS: CounterVec = CounterVec::new(
        Opts::new("node_rpc_calls_total", "Outbound RPC calls by outcome"),
        &["outcome"]  // outcome: success/error_reply/timeout/transport/cancelled
    ).expect("metric creation failed");

    /// Outbound RPC calls currently awaiting a reply
    pub static ref RPC_PENDING_CALLS: Gauge = Gauge::new(
        "node_rpc_pending_calls",
        "Outbound RPC calls awaiting a reply"
    ).expect("metric creation failed");

    /// Inbound requests by operation and outcome
    pub static ref DISPATCH_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("node_dispatch_requests_total", "Inbound RPC requests by operation and outcome"),
        &["operation", "outcome"]  // outcome: success/failure
    ).expect("metric creation failed");

    /// Handler latency
    pub static ref DISPATCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "node_dispatch_duration_seconds",
            "Time spent in operation handlers"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("bucket creation failed")),
        &["operation"]
    ).expect("metric creation failed");
}

/// Marker that the node metrics are registered.
#[derive(Debug)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all node metrics with [`REGISTRY`]. Calling it again is a no-op.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RPC_CALLS.clone()),
        Box::new(RPC_PENDING_CALLS.clone()),
        Box::new(DISPATCH_REQUESTS.clone()),
        Box::new(DISPATCH_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Count one outbound call.
pub fn record_rpc_call(outcome: &str) {
    RPC_CALLS.with_label_values(&[outcome]).inc();
}

/// Keeps one outbound call counted in `node_rpc_pending_calls` until
/// dropped.
#[must_use = "the call is counted only while the guard is alive"]
#[derive(Debug)]
pub struct PendingCallGuard {
    _private: (),
}

impl Drop for PendingCallGuard {
    fn drop(&mut self) {
        RPC_PENDING_CALLS.dec();
    }
}

/// Count one outbound call as pending.
pub fn track_pending_call() -> PendingCallGuard {
    RPC_PENDING_CALLS.inc();
    PendingCallGuard { _private: () }
}

/// Count one inbound request and observe its handler latency.
pub fn record_dispatch(operation: &str, outcome: &str, elapsed: Duration) {
    DISPATCH_REQUESTS
        .with_label_values(&[operation, outcome])
        .inc();
    DISPATCH_DURATION
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

/// Encode all node metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
