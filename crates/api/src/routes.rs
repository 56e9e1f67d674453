use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use relay_core::{config::UpstreamConfig, EgressPool, RandomSource};
use relay_dispatcher::DispatchController;

use crate::handlers::{
    health::health_check, metrics::metrics_handler, paths::path_health, relay::relay_search,
    root::root_handler,
};
use crate::transport::UpstreamTransport;

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DispatchController>,
    pub pool: Arc<EgressPool>,
    pub transport: Arc<dyn UpstreamTransport>,
    pub random: Arc<dyn RandomSource>,
    pub upstream: Arc<UpstreamConfig>,
    /// 未启用指标时为 `None`，`/metrics` 返回 404
    pub metrics_handle: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        // 健康检查
        .route("/health", get(health_check))
        // 中继接口
        .route("/naver", get(relay_search))
        // 出口路径观测
        .route("/api/paths/health", get(path_health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
