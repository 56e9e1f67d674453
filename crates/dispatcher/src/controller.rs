use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use relay_core::config::GovernanceConfig;
use relay_core::{
    AuditSink, CallOutcome, CallResult, CallSuccess, Clock, DispatchError, EgressPath, EgressPool,
    RandomSource,
};
use relay_infrastructure::{outcome_label, MetricsCollector};

use crate::health_registry::PathHealthRegistry;
use crate::outcome_recorder::OutcomeRecorder;
use crate::pacing_gate::{DispatchToken, PacingGate};
use crate::strategies::{build_strategy, PathSelectionStrategy};

/// 调度在调用完成前被取消或 panic 时上报的错误码
pub const DISPATCH_ABORTED: &str = "DISPATCH_ABORTED";

/// 出站调度控制器
///
/// 一次调度依次经过：节流等待 -> 准入 -> 选择出口路径 -> 执行调用 ->
/// 上报结果 -> 释放许可。
pub struct DispatchController {
    gate: Arc<PacingGate>,
    selector: Arc<dyn PathSelectionStrategy>,
    recorder: Arc<OutcomeRecorder>,
    clock: Arc<dyn Clock>,
    metrics: MetricsCollector,
}

impl DispatchController {
    pub fn new(
        gate: Arc<PacingGate>,
        selector: Arc<dyn PathSelectionStrategy>,
        recorder: Arc<OutcomeRecorder>,
        clock: Arc<dyn Clock>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            gate,
            selector,
            recorder,
            clock,
            metrics,
        }
    }

    /// 按治理配置组装注册表、选择策略、节流闸门和结果记录器
    pub fn from_config(
        config: &GovernanceConfig,
        audit_sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        metrics: MetricsCollector,
    ) -> Self {
        let registry = Arc::new(PathHealthRegistry::new(
            config.cooldown_policy(),
            Arc::clone(&clock),
        ));
        let selector = build_strategy(
            config.selection,
            Arc::clone(&registry),
            Arc::clone(&random),
            config.fallback,
        );
        let gate = Arc::new(PacingGate::new(
            config.pacing.clone(),
            random,
            metrics.clone(),
        ));
        let recorder = Arc::new(OutcomeRecorder::new(
            registry,
            config.block_signal_map(),
            audit_sink,
            Arc::clone(&clock),
            metrics.clone(),
        ));

        info!(
            "调度控制器已创建: 策略={}, 退化={:?}, 并发上限={}",
            selector.name(),
            config.fallback,
            config.pacing.max_concurrent
        );

        Self::new(gate, selector, recorder, clock, metrics)
    }

    pub fn gate(&self) -> &Arc<PacingGate> {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<PathHealthRegistry> {
        self.recorder.registry()
    }

    pub fn strategy_name(&self) -> &str {
        self.selector.name()
    }

    /// 执行一次受治理的出站调用
    ///
    /// `perform_call` 收到选中的出口路径（`None` 为直连），其结果原样返回；
    /// 失败包装为 [`DispatchError::Call`]。无论调用成功、失败、panic 还是
    /// 调用方中途放弃，结果都恰好上报一次、许可恰好释放一次。
    pub async fn with_dispatch<T, F, Fut>(
        &self,
        pool: &EgressPool,
        perform_call: F,
    ) -> Result<CallSuccess<T>, DispatchError>
    where
        F: FnOnce(Option<EgressPath>) -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let dispatch_id = Uuid::new_v4();
        self.dispatch(pool, perform_call)
            .instrument(info_span!("dispatch", %dispatch_id))
            .await
    }

    async fn dispatch<T, F, Fut>(
        &self,
        pool: &EgressPool,
        perform_call: F,
    ) -> Result<CallSuccess<T>, DispatchError>
    where
        F: FnOnce(Option<EgressPath>) -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let token = match self.gate.acquire().await {
            Ok(token) => token,
            Err(e) => {
                warn!("调度被拒绝: {}", e);
                self.metrics
                    .record_rejected_dispatch(outcome_label::GATE_CLOSED);
                return Err(DispatchError::GateClosed);
            }
        };

        let path = match self.resolve_path(pool) {
            Ok(path) => path,
            Err(e) => {
                // 调用没有发生：不上报，许可随 token 释放
                warn!("调度被拒绝: {}", e);
                self.metrics
                    .record_rejected_dispatch(outcome_label::NO_HEALTHY_PATH);
                return Err(e);
            }
        };

        match &path {
            Some(path) => debug!("使用出口路径: {}", path),
            None => debug!("使用直连"),
        }

        let guard = DispatchGuard {
            recorder: &self.recorder,
            metrics: &self.metrics,
            path: path.clone(),
            token: Some(token),
            started: Instant::now(),
            finished: false,
        };

        match perform_call(path).await {
            Ok(success) => {
                guard.finish(&success.outcome(), outcome_label::SUCCESS);
                Ok(success)
            }
            Err(failure) => {
                guard.finish(&failure.outcome(), outcome_label::FAILURE);
                Err(DispatchError::Call(failure))
            }
        }
    }

    /// 解析本次调度的出口路径
    ///
    /// 未启用代理时直连；池为空时使用静态配置的代理，没有则直连；
    /// 否则交给选择策略。
    pub fn resolve_path(&self, pool: &EgressPool) -> Result<Option<EgressPath>, DispatchError> {
        if !pool.is_enabled() {
            return Ok(None);
        }
        if pool.is_empty() {
            return Ok(pool.fallback().cloned());
        }

        self.selector
            .select(pool.paths(), self.clock.now())
            .map(Some)
            .ok_or(DispatchError::NoHealthyPath {
                pool_size: pool.len(),
            })
    }
}

/// 保证一次调度恰好上报一次、释放一次
struct DispatchGuard<'a> {
    recorder: &'a OutcomeRecorder,
    metrics: &'a MetricsCollector,
    path: Option<EgressPath>,
    token: Option<DispatchToken>,
    started: Instant,
    finished: bool,
}

impl DispatchGuard<'_> {
    fn finish(mut self, outcome: &CallOutcome, label: &'static str) {
        self.complete(outcome, label);
    }

    fn complete(&mut self, outcome: &CallOutcome, label: &'static str) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.recorder.report(self.path.as_ref(), outcome);
        self.metrics.record_dispatch(label, self.started.elapsed());
        if let Some(token) = self.token.take() {
            token.release();
        }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("调度在调用完成前中止");
        let outcome = CallOutcome::failed(None, Some(DISPATCH_ABORTED.to_string()))
            .with_note("dispatch aborted before the call completed");
        self.complete(&outcome, outcome_label::ABORTED);
    }
}
