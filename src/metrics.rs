//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Finger Metrics
    pub static ref FINGER_CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "apfinger_finger_connections_total",
        "Total number of accepted Finger connections"
    ).expect("metric can be created");
    pub static ref FINGER_CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "apfinger_finger_connections_active",
        "Current number of Finger connections being handled"
    ).expect("metric can be created");
    pub static ref FINGER_RESPONSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apfinger_finger_responses_total", "Total number of Finger responses by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Federation Metrics
    pub static ref FEDERATION_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apfinger_federation_requests_total", "Total number of outbound federation requests"),
        &["step", "status"]
    ).expect("metric can be created");
    pub static ref FEDERATION_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "apfinger_federation_request_duration_seconds",
            "Outbound federation request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["step"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("apfinger_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(FINGER_CONNECTIONS_TOTAL.clone()))
            .expect("FINGER_CONNECTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FINGER_CONNECTIONS_ACTIVE.clone()))
            .expect("FINGER_CONNECTIONS_ACTIVE can be registered");
        REGISTRY
            .register(Box::new(FINGER_RESPONSES_TOTAL.clone()))
            .expect("FINGER_RESPONSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FEDERATION_REQUESTS_TOTAL.clone()))
            .expect("FEDERATION_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FEDERATION_REQUEST_DURATION_SECONDS.clone()))
            .expect("FEDERATION_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
