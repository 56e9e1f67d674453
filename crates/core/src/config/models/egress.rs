use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{EgressPath, EgressPool};

/// 出口路径配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    /// 是否启用代理，关闭时所有调用直连
    pub use_proxy: bool,
    /// 轮换代理池
    pub proxies: Vec<String>,
    /// 代理池为空时使用的单个静态代理
    pub fallback_proxy: Option<String>,
}

impl EgressConfig {
    /// 合并旧版环境变量
    ///
    /// `USE_PROXY=1`、`PROXY_LIST`（逗号分隔），以及
    /// `PROXY_HOST`/`PROXY_PORT`/`PROXY_SCHEME`/`PROXY_USER`/`PROXY_PASS` 组合出的静态代理。
    pub fn merge_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup("USE_PROXY") {
            self.use_proxy = flag.trim() == "1";
        }

        if let Some(list) = lookup("PROXY_LIST") {
            let proxies: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if !proxies.is_empty() {
                self.proxies = proxies;
            }
        }

        if let (Some(host), Some(port)) = (lookup("PROXY_HOST"), lookup("PROXY_PORT")) {
            let scheme = lookup("PROXY_SCHEME").unwrap_or_else(|| "http".to_string());
            let url = match (lookup("PROXY_USER"), lookup("PROXY_PASS")) {
                (Some(user), Some(pass)) => format!("{scheme}://{user}:{pass}@{host}:{port}"),
                _ => format!("{scheme}://{host}:{port}"),
            };
            self.fallback_proxy = Some(url);
        }
    }

    /// 解析配置生成出口路径池
    pub fn build_pool(&self) -> Result<EgressPool> {
        let paths = self
            .proxies
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.parse::<EgressPath>()
                    .with_context(|| format!("第 {} 个代理配置无效", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pool = EgressPool::new(paths).with_enabled(self.use_proxy);
        if let Some(raw) = &self.fallback_proxy {
            let fallback = raw
                .parse::<EgressPath>()
                .context("静态代理配置无效")?;
            pool = pool.with_fallback(fallback);
        }
        Ok(pool)
    }

    pub fn validate(&self) -> Result<()> {
        self.build_pool().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_legacy_proxy_list() {
        let mut config = EgressConfig::default();
        config.merge_legacy_env(lookup_from(&[
            ("USE_PROXY", "1"),
            ("PROXY_LIST", "http://a:1080, ,http://b:1080 "),
        ]));

        assert!(config.use_proxy);
        assert_eq!(config.proxies, vec!["http://a:1080", "http://b:1080"]);

        let pool = config.build_pool().unwrap();
        assert!(pool.is_enabled());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_legacy_static_proxy_with_credentials() {
        let mut config = EgressConfig::default();
        config.merge_legacy_env(lookup_from(&[
            ("USE_PROXY", "1"),
            ("PROXY_HOST", "gate.example.com"),
            ("PROXY_PORT", "7000"),
            ("PROXY_USER", "u"),
            ("PROXY_PASS", "p"),
        ]));

        let pool = config.build_pool().unwrap();
        assert!(pool.is_empty());
        let fallback = pool.fallback().unwrap();
        assert_eq!(fallback.proxy_url(), "http://u:p@gate.example.com:7000");
    }

    #[test]
    fn test_use_proxy_requires_exact_flag() {
        let mut config = EgressConfig {
            use_proxy: true,
            ..Default::default()
        };
        config.merge_legacy_env(lookup_from(&[("USE_PROXY", "true")]));
        assert!(!config.use_proxy);
    }

    #[test]
    fn test_invalid_proxy_fails_validation() {
        let config = EgressConfig {
            use_proxy: true,
            proxies: vec!["http://ok:1".to_string(), "garbage".to_string()],
            fallback_proxy: None,
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("第 2 个代理配置无效"));
    }
}
