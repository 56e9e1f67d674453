use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::{BlockKind, BlockSignalMap, CooldownPolicy};

/// 节流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// 每次调用前的基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 在基础延迟上叠加的随机范围（毫秒）
    pub random_spread_ms: u64,
    /// 同时在途的最大调用数
    pub max_concurrent: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            random_spread_ms: 4000,
            max_concurrent: 1,
        }
    }
}

impl PacingConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn random_spread(&self) -> Duration {
        Duration::from_millis(self.random_spread_ms)
    }

    /// 无延迟的配置，常用于测试
    pub fn immediate(max_concurrent: usize) -> Self {
        Self {
            base_delay_ms: 0,
            random_spread_ms: 0,
            max_concurrent,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent 必须大于0");
        }
        Ok(())
    }
}

/// 单个上游拦截信号：状态码、类别与冷却时长
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSignalConfig {
    pub status: u16,
    pub kind: String,
    pub cooldown_seconds: u64,
}

/// 所有路径都在冷却时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// 退化为在整个池中选择（优先可用性）
    #[default]
    AnyPath,
    /// 拒绝本次调度
    HealthyOnly,
}

/// 路径选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategyKind {
    #[default]
    Random,
    RoundRobin,
}

/// 出口治理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub pacing: PacingConfig,
    pub block_signals: Vec<BlockSignalConfig>,
    pub selection: SelectionStrategyKind,
    pub fallback: FallbackPolicy,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            block_signals: vec![
                BlockSignalConfig {
                    status: 418,
                    kind: BlockKind::SOFT_BLOCK.to_string(),
                    cooldown_seconds: 5 * 60,
                },
                BlockSignalConfig {
                    status: 429,
                    kind: BlockKind::RATE_LIMITED.to_string(),
                    cooldown_seconds: 10 * 60,
                },
            ],
            selection: SelectionStrategyKind::default(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl GovernanceConfig {
    /// 由拦截信号配置生成冷却策略
    ///
    /// 同一类别出现多次时取最长的冷却时长。
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        let mut policy = CooldownPolicy::empty();
        for signal in &self.block_signals {
            let kind = BlockKind::new(signal.kind.clone());
            let duration = Duration::from_secs(signal.cooldown_seconds);
            if duration > policy.cooldown_for(&kind) {
                policy = policy.with_cooldown(kind, duration);
            }
        }
        policy
    }

    pub fn block_signal_map(&self) -> BlockSignalMap {
        self.block_signals
            .iter()
            .fold(BlockSignalMap::empty(), |map, signal| {
                map.with_signal(signal.status, BlockKind::new(signal.kind.clone()))
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.pacing.validate()?;

        let mut seen = HashSet::new();
        for signal in &self.block_signals {
            if signal.kind.trim().is_empty() {
                bail!("状态码 {} 的拦截类别不能为空", signal.status);
            }
            if !seen.insert(signal.status) {
                bail!("拦截信号状态码重复: {}", signal.status);
            }
        }
        Ok(())
    }
}
