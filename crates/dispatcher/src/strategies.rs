use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use relay_core::config::{FallbackPolicy, SelectionStrategyKind};
use relay_core::{EgressPath, RandomSource};

use crate::health_registry::PathHealthRegistry;

/// 出口路径选择策略
///
/// 空池返回 `None`（直连）。池非空时在健康路径中选择；全部冷却时按
/// [`FallbackPolicy`] 退化到整个池，或返回 `None` 拒绝本次调度。
pub trait PathSelectionStrategy: Send + Sync {
    fn select(&self, pool: &[EgressPath], now: DateTime<Utc>) -> Option<EgressPath>;

    fn name(&self) -> &str;
}

/// 计算候选集：健康路径，或按退化策略处理后的整个池
fn candidates(
    registry: &PathHealthRegistry,
    fallback: FallbackPolicy,
    pool: &[EgressPath],
    now: DateTime<Utc>,
) -> Vec<EgressPath> {
    let healthy = registry.healthy_paths(pool, now);
    if !healthy.is_empty() {
        return healthy;
    }

    match fallback {
        FallbackPolicy::AnyPath => {
            warn!("所有 {} 条出口路径都在冷却中，退化为全池选择", pool.len());
            pool.to_vec()
        }
        FallbackPolicy::HealthyOnly => {
            warn!("所有 {} 条出口路径都在冷却中，拒绝调度", pool.len());
            Vec::new()
        }
    }
}

pub struct HealthAwareRandomStrategy {
    registry: Arc<PathHealthRegistry>,
    random: Arc<dyn RandomSource>,
    fallback: FallbackPolicy,
}

impl HealthAwareRandomStrategy {
    pub fn new(
        registry: Arc<PathHealthRegistry>,
        random: Arc<dyn RandomSource>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            registry,
            random,
            fallback,
        }
    }
}

impl PathSelectionStrategy for HealthAwareRandomStrategy {
    fn select(&self, pool: &[EgressPath], now: DateTime<Utc>) -> Option<EgressPath> {
        if pool.is_empty() {
            debug!("出口路径池为空，使用直连");
            return None;
        }

        let candidates = candidates(&self.registry, self.fallback, pool, now);
        if candidates.is_empty() {
            return None;
        }
        let index = self.random.pick_index(candidates.len());
        let selected = candidates.get(index)?.clone();

        debug!(
            "随机策略选择出口路径: {} (索引: {}/{})",
            selected,
            index,
            candidates.len()
        );

        Some(selected)
    }

    fn name(&self) -> &str {
        "HealthAwareRandom"
    }
}

pub struct HealthAwareRoundRobinStrategy {
    registry: Arc<PathHealthRegistry>,
    fallback: FallbackPolicy,
    counter: AtomicUsize,
}

impl HealthAwareRoundRobinStrategy {
    pub fn new(registry: Arc<PathHealthRegistry>, fallback: FallbackPolicy) -> Self {
        Self {
            registry,
            fallback,
            counter: AtomicUsize::new(0),
        }
    }
}

impl PathSelectionStrategy for HealthAwareRoundRobinStrategy {
    fn select(&self, pool: &[EgressPath], now: DateTime<Utc>) -> Option<EgressPath> {
        if pool.is_empty() {
            debug!("出口路径池为空，使用直连");
            return None;
        }

        let candidates = candidates(&self.registry, self.fallback, pool, now);
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        let selected = candidates[index].clone();

        debug!(
            "轮询策略选择出口路径: {} (索引: {}/{})",
            selected,
            index,
            candidates.len()
        );

        Some(selected)
    }

    fn name(&self) -> &str {
        "HealthAwareRoundRobin"
    }
}

/// 按配置构造选择策略
pub fn build_strategy(
    kind: SelectionStrategyKind,
    registry: Arc<PathHealthRegistry>,
    random: Arc<dyn RandomSource>,
    fallback: FallbackPolicy,
) -> Arc<dyn PathSelectionStrategy> {
    match kind {
        SelectionStrategyKind::Random => {
            Arc::new(HealthAwareRandomStrategy::new(registry, random, fallback))
        }
        SelectionStrategyKind::RoundRobin => {
            Arc::new(HealthAwareRoundRobinStrategy::new(registry, fallback))
        }
    }
}
