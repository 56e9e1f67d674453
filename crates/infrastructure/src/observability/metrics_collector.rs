//! Metrics collector for the egress relay
//!
//! Dispatch outcomes, block signals, in-flight calls and audit write failures
//! are reported through the `metrics` facade; the Prometheus recorder installed
//! by [`init_metrics`] renders them for the `/metrics` endpoint.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 调度结果标签
pub mod outcome_label {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const ABORTED: &str = "aborted";
    pub const GATE_CLOSED: &str = "gate_closed";
    pub const NO_HEALTHY_PATH: &str = "no_healthy_path";
}

/// Metrics collector for the egress relay
///
/// Handles are resolved on every call, so a collector created before
/// [`init_metrics`] still reports to the installed recorder.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished dispatch, `outcome` is one of [`outcome_label`]
    pub fn record_dispatch(&self, outcome: &'static str, duration: Duration) {
        counter!("relay_dispatch_total", "outcome" => outcome).increment(1);
        histogram!("relay_dispatch_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a dispatch that never reached the upstream
    pub fn record_rejected_dispatch(&self, outcome: &'static str) {
        counter!("relay_dispatch_total", "outcome" => outcome).increment(1);
    }

    pub fn record_block_signal(&self, kind: &str, path: &str) {
        counter!("relay_block_signals_total", "kind" => kind.to_string()).increment(1);

        warn!(block_kind = kind, egress_path = path, "上游拦截信号");
    }

    pub fn update_in_flight(&self, count: usize) {
        gauge!("relay_in_flight").set(count as f64);
    }

    pub fn record_audit_write_failure(&self) {
        counter!("relay_audit_write_failures_total").increment(1);
    }
}

/// Install the global Prometheus recorder
///
/// Repeated calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("安装Prometheus指标记录器失败: {}", e))?;

    info!("Prometheus指标记录器已安装");
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_without_recorder_is_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_dispatch(outcome_label::SUCCESS, Duration::from_millis(12));
        metrics.record_rejected_dispatch(outcome_label::GATE_CLOSED);
        metrics.record_block_signal("soft-block", "http://p1:8080");
        metrics.update_in_flight(1);
        metrics.record_audit_write_failure();
    }

    #[test]
    fn test_recorded_metrics_are_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let metrics = MetricsCollector::new();
            metrics.record_dispatch(outcome_label::FAILURE, Duration::from_millis(250));
            metrics.record_block_signal("rate-limited", "http://p1:8080");
            metrics.update_in_flight(2);
        });

        let rendered = handle.render();
        assert!(rendered.contains("relay_dispatch_total{outcome=\"failure\"} 1"));
        assert!(rendered.contains("relay_block_signals_total{kind=\"rate-limited\"} 1"));
        assert!(rendered.contains("relay_in_flight 2"));
        assert!(rendered.contains("relay_dispatch_duration_seconds"));
    }

    #[test]
    fn test_collector_created_before_recorder_still_reports() {
        let metrics = MetricsCollector::new();

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics.record_dispatch(outcome_label::SUCCESS, Duration::from_millis(40));
            metrics.update_in_flight(1);
            metrics.record_audit_write_failure();
        });

        let rendered = handle.render();
        assert!(rendered.contains("relay_dispatch_duration_seconds"));
        assert!(rendered.contains("relay_in_flight 1"));
        assert!(rendered.contains("relay_audit_write_failures_total 1"));
    }
}
