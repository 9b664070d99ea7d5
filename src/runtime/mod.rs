//! # Runtime
//!
//! Process bring-up: settings, tracing, metrics, and construction of the
//! component graph.

pub mod initialization;

pub use initialization::AppState;
