use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    egress::EgressConfig,
    governance::GovernanceConfig,
    upstream::{AuditConfig, UpstreamConfig},
};

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/relay.toml",
    "relay.toml",
    "/etc/egress-relay/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ApiConfig,
    pub egress: EgressConfig,
    pub governance: GovernanceConfig,
    pub upstream: UpstreamConfig,
    pub audit: AuditConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: RELAY_, nested with `__`)
    /// 4. Legacy variables (`PORT`, `USE_PROXY`, `PROXY_*`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// 与 [`AppConfig::load`] 相同，但可以用给定的变量表代替进程环境变量
    pub fn load_with_env(
        config_path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        // 2. Environment variable overrides (prefix: RELAY_)
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("egress.proxies")
                .source(env.clone()),
        );

        let mut config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        // 3. Legacy variables
        let lookup = |key: &str| match &env {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        config.merge_legacy_env(lookup)?;

        config.validate()?;

        Ok(config)
    }

    fn merge_legacy_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("无效的PORT: {port}"))?;
        }
        self.egress.merge_legacy_env(lookup);
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("服务配置验证失败")?;
        self.egress.validate().context("出口路径配置验证失败")?;
        self.governance
            .validate()
            .context("出口治理配置验证失败")?;
        self.upstream.validate().context("上游配置验证失败")?;
        self.audit.validate().context("审计日志配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
