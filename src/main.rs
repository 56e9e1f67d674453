use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use egress_relay::{
    common::{init_logging, wait_for_shutdown_signal},
    Application, ShutdownManager,
};
use relay_core::config::AppConfig;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("egress-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("搜索接口中继服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (不指定时按默认路径查找)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别 (覆盖配置)")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式 (覆盖配置)")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);

    // 加载配置
    let config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level);
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format);

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动搜索接口中继服务");
    info!("配置文件: {}", config_path.unwrap_or("(默认)"));

    let app = Arc::new(Application::new(config).await?);

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        result = &mut app_handle => {
            // 服务在收到信号前退出，例如端口被占用
            app.shutdown().await;
            return result
                .context("应用任务异常退出")?
                .context("应用运行失败");
        }
    }

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    // 等待应用关闭，设置超时
    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("中继服务已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用运行失败: {e:#}"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => {
            warn!("中继服务关闭超时，强制退出");
            app.shutdown().await;
        }
    }

    info!("中继服务已退出");
    Ok(())
}
