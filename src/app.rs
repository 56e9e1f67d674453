use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use relay_api::{create_app, AppState, ReqwestTransport, UpstreamTransport};
use relay_core::{
    config::AppConfig, AuditSink, NoopAuditSink, RandomSource, SystemClock, ThreadRandom,
};
use relay_dispatcher::DispatchController;
use relay_infrastructure::{init_metrics, JsonLinesAuditLog, MetricsCollector};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    state: AppState,
    audit_log: Option<JsonLinesAuditLog>,
}

impl Application {
    /// 创建新的应用实例，上游请求走 reqwest
    pub async fn new(config: AppConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.upstream.timeout()));
        Self::with_transport(config, transport).await
    }

    /// 使用指定的上游传输层创建应用实例
    ///
    /// 审计日志启用时会启动后台写入任务，必须在 tokio 运行时内调用。
    pub async fn with_transport(
        config: AppConfig,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self> {
        info!("初始化应用程序");

        let pool = config.egress.build_pool().context("构建出口路径池失败")?;
        info!(
            "出口路径池: 启用={}, 路径数={}, 静态代理={}",
            pool.is_enabled(),
            pool.len(),
            pool.fallback()
                .map(|p| p.redacted())
                .unwrap_or_else(|| "无".to_string())
        );

        // 先安装全局记录器，之后上报的指标才会进入 /metrics
        let metrics_handle = if config.observability.metrics_enabled {
            Some(init_metrics().context("初始化Prometheus指标失败")?)
        } else {
            None
        };
        let metrics = MetricsCollector::new();

        // 写入任务在所有句柄丢弃后自行退出，不需要保留 JoinHandle
        let audit_log = if config.audit.enabled {
            let (log, _writer) = JsonLinesAuditLog::spawn(&config.audit.path, metrics.clone());
            Some(log)
        } else {
            info!("审计日志已关闭");
            None
        };
        let audit_sink: Arc<dyn AuditSink> = match &audit_log {
            Some(log) => Arc::new(log.clone()),
            None => Arc::new(NoopAuditSink),
        };

        let random: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
        let controller = DispatchController::from_config(
            &config.governance,
            audit_sink,
            Arc::new(SystemClock),
            Arc::clone(&random),
            metrics,
        );

        let state = AppState {
            controller: Arc::new(controller),
            pool: Arc::new(pool),
            transport,
            random,
            upstream: Arc::new(config.upstream.clone()),
            metrics_handle,
        };

        Ok(Self {
            config,
            state,
            audit_log,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// 带中间件的路由
    pub fn router(&self) -> Router {
        create_app(self.state.clone(), self.config.server.cors_enabled)
    }

    /// 运行HTTP服务直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = self.config.server.listen_address();
        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;

        info!("中继服务监听于: {}", bind_address);

        let gate = Arc::clone(self.state.controller.gate());
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP服务收到关闭信号");
                // 正在排队的调度立即返回，不再发出新的上游请求
                gate.close();
            })
            .await
            .context("HTTP服务运行失败")?;

        self.shutdown().await;
        Ok(())
    }

    /// 关闭节流闸门并等待审计日志落盘
    pub async fn shutdown(&self) {
        self.state.controller.gate().close();

        if let Some(audit_log) = &self.audit_log {
            match audit_log.flush().await {
                Ok(()) => info!("审计日志已落盘: {}", audit_log.path().display()),
                Err(e) => warn!("审计日志落盘失败: {}", e),
            }
        }
    }
}
