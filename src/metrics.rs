//! Production-grade metrics with Prometheus.
//!
//! Exposes key operational metrics for monitoring and alerting:
//! - Request rates and latencies
//! - Masking throughput and entity counts per classification
//! - Classification outcomes
//!
//! NOTE: Labels are limited to fixed, low-cardinality sets (PII classes,
//! ticket categories, status codes); nothing request-derived ever becomes
//! a label.

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "mailguard_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("mailguard_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    // ============================================================================
    // Masking Metrics
    // ============================================================================

    /// Mask operation duration
    pub static ref MASK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mailguard_mask_duration_seconds",
            "PII masking duration per email"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).unwrap();

    /// Detected PII entities by classification
    pub static ref PII_ENTITIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "mailguard_pii_entities_total",
            "Detected PII entities by classification"
        ),
        &["classification"]
    ).unwrap();

    // ============================================================================
    // Classification Metrics
    // ============================================================================

    /// Classification outcomes by category
    pub static ref CLASSIFY_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "mailguard_classify_total",
            "Classification outcomes by category"
        ),
        &["category", "result"]
    ).unwrap();

    /// Classifier inference duration
    pub static ref CLASSIFY_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mailguard_classify_duration_seconds",
            "Classifier inference duration"
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
    ).unwrap();
}

/// Register all metrics with the global registry.
/// Call once at startup before serving.
pub fn register_metrics() -> prometheus::Result<()> {
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(MASK_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(PII_ENTITIES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CLASSIFY_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CLASSIFY_DURATION.clone()))?;
    Ok(())
}
