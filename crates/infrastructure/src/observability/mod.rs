//! Observability module
//!
//! Prometheus metrics for dispatch governance.

pub mod metrics_collector;

pub use metrics_collector::{init_metrics, outcome_label, MetricsCollector};
