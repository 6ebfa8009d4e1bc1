//! Process-wide pipeline counters.
//!
//! Counters are only ever incremented and read for reporting; nothing in the
//! pipeline branches on them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::models::FlightSource;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    runs: AtomicU64,
    empty_runs: AtomicU64,
    adapter_failures: AtomicU64,
    adapter_timeouts: AtomicU64,
    adapter_panics: AtomicU64,
    records_structured: AtomicU64,
    records_hidden_city: AtomicU64,
    records_suggested: AtomicU64,
    fallbacks: AtomicU64,
    model_failures: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub empty_runs: u64,
    pub adapter_failures: u64,
    pub adapter_timeouts: u64,
    pub adapter_panics: u64,
    pub records_structured: u64,
    pub records_hidden_city: u64,
    pub records_suggested: u64,
    pub fallbacks: u64,
    pub model_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_run(&self) {
        self.empty_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adapter_failure(&self) {
        self.adapter_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adapter_timeout(&self) {
        self.adapter_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adapter_panic(&self) {
        self.adapter_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Count records that survived filtering for a stream
    pub fn record_records(&self, source: FlightSource, count: usize) {
        let counter = match source {
            FlightSource::Structured => &self.records_structured,
            FlightSource::HiddenCity => &self.records_hidden_city,
            FlightSource::SuggestedHiddenCity => &self.records_suggested,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_failure(&self) {
        self.model_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            empty_runs: self.empty_runs.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            adapter_timeouts: self.adapter_timeouts.load(Ordering::Relaxed),
            adapter_panics: self.adapter_panics.load(Ordering::Relaxed),
            records_structured: self.records_structured.load(Ordering::Relaxed),
            records_hidden_city: self.records_hidden_city.load(Ordering::Relaxed),
            records_suggested: self.records_suggested.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_increments() {
        let metrics = Arc::new(PipelineMetrics::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        metrics.record_run();
                        metrics.record_records(FlightSource::HiddenCity, 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 800);
        assert_eq!(snapshot.records_hidden_city, 1600);
        assert_eq!(snapshot.records_structured, 0);
    }
}
