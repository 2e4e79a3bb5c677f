use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging;

#[derive(Debug, Default)]
pub struct Metrics {
    api_requests: AtomicU64,
    retries: AtomicU64,
    records_fetched: AtomicU64,
    sub_resource_fetches: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub api_requests: u64,
    pub retries: u64,
    pub records_fetched: u64,
    pub sub_resource_fetches: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_api_request(&self) {
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_fetched(&self, count: u64) {
        self.records_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_sub_resource_fetch(&self) {
        self.sub_resource_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            api_requests: self.api_requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            records_fetched: self.records_fetched.load(Ordering::Relaxed),
            sub_resource_fetches: self.sub_resource_fetches.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        logging::info(format!(
            "metrics api_requests={} retries={} records_fetched={} sub_resource_fetches={}",
            snapshot.api_requests,
            snapshot.retries,
            snapshot.records_fetched,
            snapshot.sub_resource_fetches
        ));
    }
}
