//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic; the embedding service decides how
//! (and whether) to expose `REGISTRY`.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Ordered collection metrics
    pub static ref COLLECTION_MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fanfolio_collection_mutations_total", "Total number of successful ordered-collection mutations"),
        &["collection", "operation"]
    ).expect("metric can be created");

    // Reply thread metrics
    pub static ref REPLY_OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fanfolio_reply_operations_total", "Total number of reply thread operations"),
        &["operation"]
    ).expect("metric can be created");

    // Cache metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fanfolio_cache_hits_total", "Total number of aggregate cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fanfolio_cache_misses_total", "Total number of aggregate cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("fanfolio_cache_size", "Current number of aggregates in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Hydration metrics
    pub static ref HYDRATIONS_TOTAL: IntCounter = IntCounter::new(
        "fanfolio_hydrations_total",
        "Total number of successful hydrations"
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fanfolio_errors_total", "Total number of model errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Call once at startup; registering twice fails inside `prometheus`.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(COLLECTION_MUTATIONS_TOTAL.clone()))
        .expect("COLLECTION_MUTATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(REPLY_OPERATIONS_TOTAL.clone()))
        .expect("REPLY_OPERATIONS_TOTAL can be registered");
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
        .register(Box::new(HYDRATIONS_TOTAL.clone()))
        .expect("HYDRATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
