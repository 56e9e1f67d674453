//! Test doubles for the clock, random source and audit sink traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use relay_core::{AuditRecord, AuditSink, Clock, RandomSource, RelayError, RelayResult};

/// Clock whose time only moves when the test says so
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Clock starting at 2024-01-01T00:00:00Z
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Random source replaying a fixed script of values
///
/// Each value is reduced modulo the requested upper bound; once the script is
/// exhausted it returns 0.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<u64>>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Always returns 0: first candidate, no jitter
    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> usize {
        self.values.lock().unwrap().len()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_below(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.values
            .lock()
            .unwrap()
            .pop_front()
            .map(|v| v % upper)
            .unwrap_or(0)
    }
}

/// Audit sink keeping every record in memory
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl AuditSink for RecordingAuditSink {
    fn append(&self, record: AuditRecord) -> RelayResult<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Audit sink that rejects every record
#[derive(Debug, Default)]
pub struct FailingAuditSink {
    attempts: AtomicUsize,
}

impl FailingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AuditSink for FailingAuditSink {
    fn append(&self, _record: AuditRecord) -> RelayResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RelayError::AuditLog("disk full".to_string()))
    }
}
