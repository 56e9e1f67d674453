//! Pacing gate: randomized pre-call delay plus a global in-flight ceiling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use relay_core::config::PacingConfig;
use relay_core::{RandomSource, RelayError, RelayResult};
use relay_infrastructure::MetricsCollector;

/// 节流闸门
///
/// 每次 `acquire` 先无条件等待 `[base, base + spread)` 内的随机时长，再等待
/// 在途调用数低于上限。准入由信号量唤醒，不轮询。
pub struct PacingGate {
    config: PacingConfig,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    random: Arc<dyn RandomSource>,
    metrics: MetricsCollector,
}

impl PacingGate {
    pub fn new(
        config: PacingConfig,
        random: Arc<dyn RandomSource>,
        metrics: MetricsCollector,
    ) -> Self {
        // 0 会让所有调度永久等待，配置校验已拒绝，这里再兜底为 1
        let permits = config.max_concurrent.max(1);
        Self {
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            random,
            metrics,
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// 下一次调用前的延迟
    pub fn next_delay(&self) -> Duration {
        self.random
            .jittered(self.config.base_delay(), self.config.random_spread())
    }

    /// 获取一次调用的许可
    ///
    /// 调用方在等待期间被取消时不会占用准入名额。只有闸门关闭后才返回错误。
    pub async fn acquire(&self) -> RelayResult<DispatchToken> {
        if self.semaphore.is_closed() {
            return Err(RelayError::GateClosed);
        }

        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!("调度前等待 {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RelayError::GateClosed)?;

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.update_in_flight(in_flight);
        debug!(
            "调度准入 (在途: {}/{})",
            in_flight, self.config.max_concurrent
        );

        Ok(DispatchToken {
            permit: Some(permit),
            in_flight: Arc::clone(&self.in_flight),
            metrics: self.metrics.clone(),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 关闭闸门：等待中和之后的 `acquire` 都返回 [`RelayError::GateClosed`]，
    /// 已发出的许可不受影响
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            self.semaphore.close();
            info!("节流闸门已关闭 (在途: {})", self.in_flight());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// 一次出站调用的许可，只释放一次
///
/// 显式 [`DispatchToken::release`] 或 drop 都会释放。
pub struct DispatchToken {
    permit: Option<OwnedSemaphorePermit>,
    in_flight: Arc<AtomicUsize>,
    metrics: MetricsCollector,
}

impl DispatchToken {
    pub fn release(mut self) {
        self.release_slot();
    }

    fn release_slot(&mut self) {
        if let Some(permit) = self.permit.take() {
            // 先减计数再归还名额，新准入者看到的计数不会超过上限
            let in_flight = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            self.metrics.update_in_flight(in_flight);
            drop(permit);
        }
    }
}

impl Drop for DispatchToken {
    fn drop(&mut self) {
        self.release_slot();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::SeededRandom;
    use relay_testing_utils::ScriptedRandom;
    use tokio::time::Instant;

    fn gate(config: PacingConfig) -> PacingGate {
        PacingGate::new(config, Arc::new(SeededRandom::new(1)), MetricsCollector::new())
    }

    #[test]
    fn test_next_delay_within_range() {
        let gate = gate(PacingConfig::default());
        for _ in 0..1000 {
            let delay = gate.next_delay();
            assert!(delay >= Duration::from_millis(3000));
            assert!(delay < Duration::from_millis(7000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_delay() {
        let gate = PacingGate::new(
            PacingConfig::default(),
            Arc::new(ScriptedRandom::new([1500])),
            MetricsCollector::new(),
        );

        let started = Instant::now();
        let token = gate.acquire().await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(4500));
        assert!(waited < Duration::from_millis(4600));
        assert_eq!(gate.in_flight(), 1);

        token.release();
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available_slots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_is_never_exceeded() {
        let gate = Arc::new(gate(PacingConfig {
            base_delay_ms: 10,
            random_spread_ms: 50,
            max_concurrent: 1,
        }));
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let current = Arc::clone(&current);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let token = gate.acquire().await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    assert!(gate.in_flight() <= 1);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    drop(token);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_higher_ceiling_admits_in_parallel() {
        let gate = gate(PacingConfig::immediate(3));

        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        let c = gate.acquire().await.unwrap();
        assert_eq!(gate.in_flight(), 3);
        assert_eq!(gate.available_slots(), 0);

        let blocked = tokio::time::timeout(Duration::from_secs(1), gate.acquire()).await;
        assert!(blocked.is_err());

        drop((a, b, c));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_does_not_take_slot() {
        let gate = gate(PacingConfig::immediate(1));
        let held = gate.acquire().await.unwrap();

        // 等待中的调用被取消
        let waiting = tokio::time::timeout(Duration::from_millis(100), gate.acquire()).await;
        assert!(waiting.is_err());
        assert_eq!(gate.in_flight(), 1);

        drop(held);
        assert_eq!(gate.available_slots(), 1);

        let next = tokio::time::timeout(Duration::from_millis(100), gate.acquire()).await;
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_release() {
        let gate = Arc::new(gate(PacingConfig::immediate(1)));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        held.release();
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_closed_gate_rejects_acquire() {
        let gate = gate(PacingConfig::immediate(1));
        let held = gate.acquire().await.unwrap();

        gate.close();
        assert!(gate.is_closed());
        assert!(matches!(gate.acquire().await, Err(RelayError::GateClosed)));

        // 已发出的许可仍然正常释放
        drop(held);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let gate = Arc::new(gate(PacingConfig::immediate(1)));
        let _held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;

        gate.close();
        assert!(matches!(waiter.await.unwrap(), Err(RelayError::GateClosed)));
    }
}
