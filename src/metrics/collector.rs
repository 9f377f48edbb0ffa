use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub total_verifications: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    rejections_by_kind: DashMap<&'static str, AtomicU64>,
    started: Instant,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_verifications: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub acceptance_rate: f64,
    pub rejections_by_kind: BTreeMap<String, u64>,
    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_verifications: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            rejections_by_kind: DashMap::new(),
            started: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.total_verifications.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, kind: &'static str) {
        self.total_verifications.fetch_add(1, Ordering::Relaxed);
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.rejections_by_kind
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let total_verifications = self.total_verifications.load(Ordering::Relaxed);
        let accepted = self.accepted.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);

        let acceptance_rate = if total_verifications > 0 {
            (accepted as f64 / total_verifications as f64) * 100.0
        } else {
            0.0
        };

        let rejections_by_kind = self
            .rejections_by_kind
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            total_verifications,
            accepted,
            rejected,
            acceptance_rate,
            rejections_by_kind,
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
