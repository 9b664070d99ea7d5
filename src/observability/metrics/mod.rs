//! # Service Metrics
//!
//! Counters for git operations, cache traffic, refresh notifications, and
//! resolver requests.

pub mod registry;

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, Opts};
use std::sync::LazyLock;

use registry::REGISTRY;

static GIT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "config_server_git_operations_total",
            "Total git operations by kind",
        ),
        &["operation"],
    )
    .expect("Failed to create GIT_OPERATIONS_TOTAL metric - this should never happen")
});

static GIT_OPERATION_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "config_server_git_operation_failures_total",
            "Total failed git operations by kind",
        ),
        &["operation"],
    )
    .expect("Failed to create GIT_OPERATION_FAILURES_TOTAL metric - this should never happen")
});

static CACHE_HITS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("config_server_cache_hits_total", "Cache hits by region"),
        &["region"],
    )
    .expect("Failed to create CACHE_HITS_TOTAL metric - this should never happen")
});

static CACHE_MISSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("config_server_cache_misses_total", "Cache misses by region"),
        &["region"],
    )
    .expect("Failed to create CACHE_MISSES_TOTAL metric - this should never happen")
});

static CACHE_EVICTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "config_server_cache_evictions_total",
            "Cache eviction events by region",
        ),
        &["region"],
    )
    .expect("Failed to create CACHE_EVICTIONS_TOTAL metric - this should never happen")
});

static REFRESH_NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "config_server_refresh_notifications_total",
            "Refresh notifications by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create REFRESH_NOTIFICATIONS_TOTAL metric - this should never happen")
});

static RESOLVER_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "config_server_resolver_requests_total",
        "Total resolver requests served",
    )
    .expect("Failed to create RESOLVER_REQUESTS_TOTAL metric - this should never happen")
});

/// Register all service metrics with the shared registry.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(GIT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_EVICTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REFRESH_NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOLVER_REQUESTS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_git_operation(operation: &str) {
    GIT_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn record_git_failure(operation: &str) {
    GIT_OPERATION_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_cache_hit(region: &str) {
    CACHE_HITS_TOTAL.with_label_values(&[region]).inc();
}

pub fn record_cache_miss(region: &str) {
    CACHE_MISSES_TOTAL.with_label_values(&[region]).inc();
}

pub fn record_cache_eviction(region: &str) {
    CACHE_EVICTIONS_TOTAL.with_label_values(&[region]).inc();
}

pub fn record_notification_outcome(outcome: &str) {
    REFRESH_NOTIFICATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_resolver_request() {
    RESOLVER_REQUESTS_TOTAL.inc();
}
