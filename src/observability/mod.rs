//! # Observability
//!
//! Prometheus metrics for git operations, cache traffic, refresh
//! notifications, and resolver requests.

pub mod metrics;
