use std::sync::Arc;

use axum::Router;

use relay_core::{config::GovernanceConfig, config::UpstreamConfig, EgressPool, PacingConfig};
use relay_dispatcher::DispatchController;
use relay_infrastructure::MetricsCollector;
use relay_testing_utils::{ManualClock, RecordingAuditSink, ScriptedRandom};

use crate::routes::{create_routes, AppState};
use crate::transport::MockUpstreamTransport;

/// 无节流延迟、随机源恒取第一个候选的测试应用
pub(crate) struct TestApp {
    pub state: AppState,
    pub audit: Arc<RecordingAuditSink>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new(transport: MockUpstreamTransport, pool: EgressPool) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let audit = Arc::new(RecordingAuditSink::new());
        let random = Arc::new(ScriptedRandom::zeros());

        let governance = GovernanceConfig {
            pacing: PacingConfig::immediate(1),
            ..GovernanceConfig::default()
        };
        let controller = DispatchController::from_config(
            &governance,
            audit.clone(),
            clock.clone(),
            random.clone(),
            MetricsCollector::new(),
        );

        let state = AppState {
            controller: Arc::new(controller),
            pool: Arc::new(pool),
            transport: Arc::new(transport),
            random,
            upstream: Arc::new(UpstreamConfig::default()),
            metrics_handle: None,
        };

        Self {
            state,
            audit,
            clock,
        }
    }

    pub fn router(&self) -> Router {
        create_routes(self.state.clone())
    }
}
