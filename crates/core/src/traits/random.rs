use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 随机数来源
///
/// 路径选择、节流延迟和请求指纹都从这里取随机数，测试中可注入确定性实现。
pub trait RandomSource: Send + Sync {
    /// 返回 `[0, upper)` 内的均匀随机数；`upper == 0` 时返回 0
    fn next_below(&self, upper: u64) -> u64;

    /// 在 `len` 个候选中均匀选择一个下标
    fn pick_index(&self, len: usize) -> usize {
        self.next_below(len as u64) as usize
    }

    /// 返回 `[base, base + spread)` 内的均匀随机时长
    fn jittered(&self, base: Duration, spread: Duration) -> Duration {
        let spread_ms = spread.as_millis().min(u64::MAX as u128) as u64;
        base + Duration::from_millis(self.next_below(spread_ms))
    }
}

/// 基于线程本地生成器的随机源
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        rand::rng().random_range(0..upper)
    }
}

/// 固定种子的随机源，序列可复现
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(0..upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_upper_bound() {
        assert_eq!(ThreadRandom.next_below(0), 0);
        assert_eq!(SeededRandom::new(7).next_below(0), 0);
    }

    #[test]
    fn test_values_stay_in_range() {
        let random = ThreadRandom;
        for _ in 0..1000 {
            assert!(random.next_below(3) < 3);
            assert!(random.pick_index(5) < 5);
        }
    }

    #[test]
    fn test_jittered_range() {
        let random = SeededRandom::new(42);
        let base = Duration::from_millis(3000);
        let spread = Duration::from_millis(4000);
        for _ in 0..1000 {
            let delay = random.jittered(base, spread);
            assert!(delay >= base);
            assert!(delay < base + spread);
        }
        assert_eq!(random.jittered(base, Duration::ZERO), base);
    }

    #[test]
    fn test_seeded_sequences_repeat() {
        let a = SeededRandom::new(99);
        let b = SeededRandom::new(99);
        let seq_a: Vec<u64> = (0..20).map(|_| a.next_below(1000)).collect();
        let seq_b: Vec<u64> = (0..20).map(|_| b.next_below(1000)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
