use std::sync::Arc;

use tracing::{debug, warn};

use relay_core::{
    AuditRecord, AuditSink, BlockKind, BlockSignalMap, CallOutcome, Clock, EgressPath,
};
use relay_infrastructure::MetricsCollector;

use crate::health_registry::PathHealthRegistry;

/// 调用结果记录器
///
/// 健康状态的唯一写入者：把状态码映射为拦截类别、更新路径健康并追加审计记录。
/// 审计写入失败只记日志，不影响调度结果。
pub struct OutcomeRecorder {
    registry: Arc<PathHealthRegistry>,
    signals: BlockSignalMap,
    audit_sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

impl OutcomeRecorder {
    pub fn new(
        registry: Arc<PathHealthRegistry>,
        signals: BlockSignalMap,
        audit_sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            registry,
            signals,
            audit_sink,
            clock,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<PathHealthRegistry> {
        &self.registry
    }

    /// 失败结果的拦截类别；成功结果永远没有
    pub fn block_kind_for(&self, outcome: &CallOutcome) -> Option<BlockKind> {
        if outcome.success {
            return None;
        }
        outcome
            .status_code
            .and_then(|status| self.signals.kind_for_status(status))
            .cloned()
    }

    /// 上报一次调用结果，`path` 为 `None` 表示直连
    pub fn report(&self, path: Option<&EgressPath>, outcome: &CallOutcome) {
        let now = self.clock.now();
        let block_kind = self.block_kind_for(outcome);
        let path_label = path
            .map(EgressPath::redacted)
            .unwrap_or_else(|| "direct".to_string());

        if let Some(kind) = &block_kind {
            self.metrics.record_block_signal(kind.as_str(), &path_label);
        }

        // 直连没有健康记录
        if let Some(path) = path {
            self.registry
                .record_outcome_at(path, outcome.success, block_kind, now);
        }

        debug!(
            "调用结果: {} success={} status={:?} code={:?}",
            path_label, outcome.success, outcome.status_code, outcome.error_code
        );

        let record = AuditRecord::from_outcome(path, outcome, now);
        if let Err(e) = self.audit_sink.append(record) {
            warn!("追加审计记录失败: {}", e);
            self.metrics.record_audit_write_failure();
        }
    }
}
