use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use relay_core::{BlockKind, Clock, CooldownPolicy, EgressPath, PathHealth, PathHealthSnapshot};

/// 出口路径健康注册表
///
/// 按路径保存成功/失败计数和各拦截类别的最近拦截时间。记录在首次上报时创建，
/// 进程存活期间不删除（数量以路径池大小为上限）。
///
/// 只有 [`crate::outcome_recorder::OutcomeRecorder`] 可以写入，其余组件只读。
pub struct PathHealthRegistry {
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
    states: RwLock<HashMap<EgressPath, PathHealth>>,
}

impl PathHealthRegistry {
    pub fn new(policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// 以当前时间记录一次调用结果
    #[cfg(test)]
    pub(crate) fn record_outcome(
        &self,
        path: &EgressPath,
        success: bool,
        block_kind: Option<BlockKind>,
    ) {
        self.record_outcome_at(path, success, block_kind, self.clock.now());
    }

    pub(crate) fn record_outcome_at(
        &self,
        path: &EgressPath,
        success: bool,
        block_kind: Option<BlockKind>,
        at: DateTime<Utc>,
    ) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let health = states.entry(path.clone()).or_default();
        health.record(success, block_kind, at);

        debug!(
            "记录出口路径结果: {} success={} (成功: {}, 失败: {})",
            path, success, health.success_count, health.failure_count
        );
    }

    /// 路径在 `now` 时刻是否不处于任何冷却期；未见过的路径总是健康的
    pub fn is_healthy(&self, path: &EgressPath, now: DateTime<Utc>) -> bool {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states
            .get(path)
            .map(|health| health.is_healthy(&self.policy, now))
            .unwrap_or(true)
    }

    /// 过滤出池中健康的路径，保持池内顺序
    pub fn healthy_paths(&self, pool: &[EgressPath], now: DateTime<Utc>) -> Vec<EgressPath> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        pool.iter()
            .filter(|path| {
                states
                    .get(*path)
                    .map(|health| health.is_healthy(&self.policy, now))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn health_of(&self, path: &EgressPath) -> Option<PathHealth> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.get(path).cloned()
    }

    /// 所有已记录路径以及 `known` 中路径的健康快照，按脱敏后的路径标识排序
    ///
    /// 合并按完整路径进行，仅密码不同的两条路径各占一行；`known` 中未记录过的路径以零计数列出。
    pub fn snapshot<'a>(
        &self,
        known: impl IntoIterator<Item = &'a EgressPath>,
    ) -> Vec<PathHealthSnapshot> {
        let now = self.clock.now();
        let mut entries: HashMap<EgressPath, PathHealth> = self
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for path in known {
            entries.entry(path.clone()).or_default();
        }

        let mut entries: Vec<(EgressPath, PathHealth)> = entries.into_iter().collect();
        entries.sort_by_cached_key(|(path, _)| (path.redacted(), path.proxy_url()));

        entries
            .into_iter()
            .map(|(path, health)| {
                let cooling: Vec<BlockKind> =
                    health.cooling_kinds(&self.policy, now).cloned().collect();
                PathHealthSnapshot {
                    path: path.redacted(),
                    success_count: health.success_count,
                    failure_count: health.failure_count,
                    last_blocked_at: health.last_blocked_at,
                    healthy: cooling.is_empty(),
                    cooling,
                }
            })
            .collect()
    }

    pub fn tracked_paths(&self) -> usize {
        self.states.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
