//! # Relay API
//!
//! 搜索接口中继服务的HTTP接口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET /` - 存活探测
//! - `GET /health` - 健康检查
//! - `GET /naver?url=...` - 中继一次上游搜索请求
//! - `GET /api/paths/health` - 出口路径健康状态
//! - `GET /metrics` - Prometheus格式指标（启用时）
//!
//! 中继请求经 [`relay_dispatcher::DispatchController`] 节流和选择出口路径后，
//! 由 [`transport::UpstreamTransport`] 发出。

pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod mapper;
pub mod middleware;
pub mod routes;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
pub use transport::{ReqwestTransport, UpstreamRequest, UpstreamTransport};

/// 创建带中间件的应用
pub fn create_app(state: AppState, cors_enabled: bool) -> Router {
    let router = create_routes(state)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(middleware::trace_layer());

    if cors_enabled {
        router.layer(middleware::cors_layer())
    } else {
        router
    }
}
