use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 上游拦截信号的类别
///
/// 类别是开放的字符串，内置 `soft-block` 与 `rate-limited`，其余由配置扩展。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKind(String);

impl BlockKind {
    pub const SOFT_BLOCK: &'static str = "soft-block";
    pub const RATE_LIMITED: &'static str = "rate-limited";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// 机器人检测 (HTTP 418)
    pub fn soft_block() -> Self {
        Self::new(Self::SOFT_BLOCK)
    }

    /// 限流 (HTTP 429)
    pub fn rate_limited() -> Self {
        Self::new(Self::RATE_LIMITED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 冷却策略：拦截类别 -> 冷却时长
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    durations: HashMap<BlockKind, Duration>,
}

impl CooldownPolicy {
    /// 空策略，任何类别都不冷却
    pub fn empty() -> Self {
        Self {
            durations: HashMap::new(),
        }
    }

    pub fn with_cooldown(mut self, kind: BlockKind, duration: Duration) -> Self {
        self.durations.insert(kind, duration);
        self
    }

    /// 未配置的类别冷却时长为零
    pub fn cooldown_for(&self, kind: &BlockKind) -> Duration {
        self.durations.get(kind).copied().unwrap_or(Duration::ZERO)
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::empty()
            .with_cooldown(BlockKind::soft_block(), Duration::from_secs(5 * 60))
            .with_cooldown(BlockKind::rate_limited(), Duration::from_secs(10 * 60))
    }
}

/// 状态码 -> 拦截类别 的显式映射
#[derive(Debug, Clone)]
pub struct BlockSignalMap {
    by_status: HashMap<u16, BlockKind>,
}

impl BlockSignalMap {
    pub fn empty() -> Self {
        Self {
            by_status: HashMap::new(),
        }
    }

    pub fn with_signal(mut self, status: u16, kind: BlockKind) -> Self {
        self.by_status.insert(status, kind);
        self
    }

    pub fn kind_for_status(&self, status: u16) -> Option<&BlockKind> {
        self.by_status.get(&status)
    }
}

impl Default for BlockSignalMap {
    fn default() -> Self {
        Self::empty()
            .with_signal(418, BlockKind::soft_block())
            .with_signal(429, BlockKind::rate_limited())
    }
}

/// 单条出口路径的健康记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathHealth {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_blocked_at: BTreeMap<BlockKind, DateTime<Utc>>,
}

impl PathHealth {
    pub fn record(&mut self, success: bool, block_kind: Option<BlockKind>, at: DateTime<Utc>) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        if let Some(kind) = block_kind {
            self.last_blocked_at.insert(kind, at);
        }
    }

    /// 在 `now` 时刻仍处于冷却期的类别
    ///
    /// 时钟回拨导致 `now` 早于拦截时间时，视为仍在冷却。
    pub fn cooling_kinds<'a>(
        &'a self,
        policy: &'a CooldownPolicy,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a BlockKind> + 'a {
        self.last_blocked_at
            .iter()
            .filter(move |(kind, blocked_at)| {
                let cooldown = policy.cooldown_for(kind);
                match (now - **blocked_at).to_std() {
                    Ok(elapsed) => elapsed < cooldown,
                    Err(_) => !cooldown.is_zero(),
                }
            })
            .map(|(kind, _)| kind)
    }

    pub fn is_healthy(&self, policy: &CooldownPolicy, now: DateTime<Utc>) -> bool {
        self.cooling_kinds(policy, now).next().is_none()
    }

    pub fn total_calls(&self) -> u64 {
        self.success_count + self.failure_count
    }
}

/// 出口路径健康快照，供观测接口使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathHealthSnapshot {
    pub path: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_blocked_at: BTreeMap<BlockKind, DateTime<Utc>>,
    pub cooling: Vec<BlockKind>,
    pub healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_health_is_healthy() {
        let health = PathHealth::default();
        assert!(health.is_healthy(&CooldownPolicy::default(), t0()));
        assert_eq!(health.total_calls(), 0);
    }

    #[test]
    fn test_soft_block_cooldown_window() {
        let policy = CooldownPolicy::default();
        let mut health = PathHealth::default();
        health.record(false, Some(BlockKind::soft_block()), t0());

        let just_before = t0() + chrono::Duration::milliseconds(299_999);
        let at_expiry = t0() + chrono::Duration::milliseconds(300_000);

        assert!(!health.is_healthy(&policy, t0()));
        assert!(!health.is_healthy(&policy, just_before));
        assert!(health.is_healthy(&policy, at_expiry));
    }

    #[test]
    fn test_kinds_cool_independently() {
        let policy = CooldownPolicy::default();
        let mut health = PathHealth::default();
        health.record(false, Some(BlockKind::rate_limited()), t0());
        health.record(
            false,
            Some(BlockKind::soft_block()),
            t0() + chrono::Duration::minutes(8),
        );

        // 429 冷却到 10 分钟，418 冷却到 13 分钟
        let at_11 = t0() + chrono::Duration::minutes(11);
        let cooling: Vec<_> = health.cooling_kinds(&policy, at_11).collect();
        assert_eq!(cooling, vec![&BlockKind::soft_block()]);

        assert!(health.is_healthy(&policy, t0() + chrono::Duration::minutes(13)));
    }

    #[test]
    fn test_unknown_kind_has_no_cooldown() {
        let policy = CooldownPolicy::default();
        let mut health = PathHealth::default();
        health.record(false, Some(BlockKind::new("captcha")), t0());
        assert!(health.is_healthy(&policy, t0()));
    }

    #[test]
    fn test_clock_skew_counts_as_cooling() {
        let policy = CooldownPolicy::default();
        let mut health = PathHealth::default();
        health.record(false, Some(BlockKind::soft_block()), t0());
        assert!(!health.is_healthy(&policy, t0() - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_default_signal_map() {
        let signals = BlockSignalMap::default();
        assert_eq!(signals.kind_for_status(418), Some(&BlockKind::soft_block()));
        assert_eq!(signals.kind_for_status(429), Some(&BlockKind::rate_limited()));
        assert_eq!(signals.kind_for_status(500), None);
    }

    #[test]
    fn test_block_kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&BlockKind::rate_limited()).unwrap();
        assert_eq!(json, "\"rate-limited\"");
    }
}
