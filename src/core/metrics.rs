//! Prometheus metrics for monitoring the gateway.
//!
//! This module provides a centralized metrics registry tracking inbound
//! requests and upstream latency.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, route, model and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds (time to response headers)
    pub request_duration: HistogramVec,

    /// Number of currently active requests by route
    pub active_requests: GaugeVec,

    /// Upstream response latency (time to headers) by endpoint kind and outcome
    pub upstream_latency: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// This should be called once at application startup. Subsequent calls will
/// return the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "poe_gateway_requests_total",
            "Total number of requests",
            &["method", "endpoint", "model", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "poe_gateway_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "poe_gateway_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let upstream_latency = register_histogram_vec!(
            "poe_gateway_upstream_latency_seconds",
            "Upstream response latency in seconds",
            &["kind", "outcome"],
            vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]
        )
        .expect("Failed to register upstream_latency metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            upstream_latency,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
