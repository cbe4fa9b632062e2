//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{Counter, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("imageboard_http_requests_total", "Total number of board page requests"),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("imageboard_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("imageboard_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("imageboard_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounter = IntCounter::new(
        "imageboard_media_uploads_total",
        "Total number of accepted media uploads"
    ).expect("metric can be created");
    pub static ref MEDIA_DEDUPLICATED_TOTAL: IntCounter = IntCounter::new(
        "imageboard_media_deduplicated_total",
        "Uploads whose content was already stored"
    ).expect("metric can be created");
    pub static ref MEDIA_BYTES_UPLOADED: Counter = Counter::new(
        "imageboard_media_bytes_uploaded_total",
        "Total bytes of media uploaded"
    ).expect("metric can be created");
    pub static ref MEDIA_RELEASED_TOTAL: IntCounter = IntCounter::new(
        "imageboard_media_released_total",
        "Stored files deleted after their last reference went away"
    ).expect("metric can be created");
    pub static ref UPLOAD_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("imageboard_upload_rejections_total", "Uploads rejected by validation"),
        &["reason"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref POSTS_TOTAL: IntGauge = IntGauge::new(
        "imageboard_posts_total",
        "Total number of posts"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("imageboard_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_SIZE.clone()))
            .expect("CACHE_SIZE can be registered");
        REGISTRY
            .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
            .expect("MEDIA_UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_DEDUPLICATED_TOTAL.clone()))
            .expect("MEDIA_DEDUPLICATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_BYTES_UPLOADED.clone()))
            .expect("MEDIA_BYTES_UPLOADED can be registered");
        REGISTRY
            .register(Box::new(MEDIA_RELEASED_TOTAL.clone()))
            .expect("MEDIA_RELEASED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPLOAD_REJECTIONS_TOTAL.clone()))
            .expect("UPLOAD_REJECTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(POSTS_TOTAL.clone()))
            .expect("POSTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
