use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// 上游接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
    /// 目标URL的主机名必须包含的片段
    pub allowed_host: String,
    /// 目标URL的路径必须包含的片段
    pub required_path: String,
    pub referer: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            allowed_host: "naver.com".to_string(),
            required_path: "paged-composite-cards".to_string(),
            referer: "https://search.shopping.naver.com/ns/search".to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            bail!("timeout_ms 必须大于0");
        }
        if self.allowed_host.trim().is_empty() {
            bail!("allowed_host 不能为空");
        }
        Ok(())
    }
}

/// 审计日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "proxy-usage.log".to_string(),
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.path.trim().is_empty() {
            bail!("启用审计日志时必须指定 path");
        }
        Ok(())
    }
}
