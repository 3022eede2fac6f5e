//! Metrics collection and reporting for ccdn.
//!
//! Counters are plain atomics so every routing engine and the coordinator can
//! share one [`CcdnMetrics`] through an `Arc`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cmp::CmpType;

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<u64>,
    underflow: AtomicU64,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len())
            .map(|_| AtomicU64::new(0))
            .collect();

        Self {
            buckets,
            boundaries,
            underflow: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if self.boundaries.first().map_or(true, |&low| value < low) {
            self.underflow.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count.load(Ordering::Relaxed);
        if c == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }
}

/// Default buckets for fetch latency, in microseconds.
fn latency_buckets() -> Vec<u64> {
    vec![10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000]
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for ccdn
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct CcdnMetrics {
    // Forwarding metrics
    pub packets_forwarded: Counter,
    pub packets_delivered: Counter,
    pub packets_dropped: Counter,
    pub no_route: Counter,
    pub request_timeouts: Counter,

    // Content routing metrics
    pub fib_hits: Counter,
    pub fib_misses: Counter,
    pub hash_escalations: Counter,

    // CMP metrics, indexed by packet type
    pub cmp_sent: [Counter; 5],
    pub cmp_received: [Counter; 5],

    // Coordinator metrics
    pub cache_hits: Counter,
    pub cache_insertions: Counter,
    pub transfers_started: Counter,
    pub retries: Counter,
    pub tasks_registered: Counter,
    pub tasks_finished: Counter,
    pub tasks_abandoned: Counter,
    pub tasks_pending: Gauge,

    /// Time from task registration to finish, in microseconds of virtual time
    pub fetch_latency: Histogram,
}

impl Default for CcdnMetrics {
    fn default() -> Self {
        Self {
            packets_forwarded: Counter::new(),
            packets_delivered: Counter::new(),
            packets_dropped: Counter::new(),
            no_route: Counter::new(),
            request_timeouts: Counter::new(),
            fib_hits: Counter::new(),
            fib_misses: Counter::new(),
            hash_escalations: Counter::new(),
            cmp_sent: Default::default(),
            cmp_received: Default::default(),
            cache_hits: Counter::new(),
            cache_insertions: Counter::new(),
            transfers_started: Counter::new(),
            retries: Counter::new(),
            tasks_registered: Counter::new(),
            tasks_finished: Counter::new(),
            tasks_abandoned: Counter::new(),
            tasks_pending: Gauge::new(),
            fetch_latency: Histogram::new(latency_buckets()),
        }
    }
}

impl CcdnMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self, kind: CmpType) -> &Counter {
        &self.cmp_sent[kind as usize]
    }

    pub fn received(&self, kind: CmpType) -> &Counter {
        &self.cmp_received[kind as usize]
    }

    /// Point-in-time copy suitable for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_forwarded: self.packets_forwarded.value(),
            packets_delivered: self.packets_delivered.value(),
            packets_dropped: self.packets_dropped.value(),
            no_route: self.no_route.value(),
            request_timeouts: self.request_timeouts.value(),
            fib_hits: self.fib_hits.value(),
            fib_misses: self.fib_misses.value(),
            hash_escalations: self.hash_escalations.value(),
            requests_sent: self.sent(CmpType::Request).value(),
            replies_sent: self.sent(CmpType::Reply).value(),
            rejects_sent: self.sent(CmpType::Reject).value(),
            finishes_sent: self.sent(CmpType::Finish).value(),
            finish_acks_sent: self.sent(CmpType::FinishAck).value(),
            cache_hits: self.cache_hits.value(),
            cache_insertions: self.cache_insertions.value(),
            transfers_started: self.transfers_started.value(),
            retries: self.retries.value(),
            tasks_registered: self.tasks_registered.value(),
            tasks_finished: self.tasks_finished.value(),
            tasks_abandoned: self.tasks_abandoned.value(),
            tasks_pending: self.tasks_pending.value(),
            mean_fetch_latency_us: self.fetch_latency.average(),
        }
    }
}

/// Serializable view of [`CcdnMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub packets_forwarded: u64,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
    pub no_route: u64,
    pub request_timeouts: u64,
    pub fib_hits: u64,
    pub fib_misses: u64,
    pub hash_escalations: u64,
    pub requests_sent: u64,
    pub replies_sent: u64,
    pub rejects_sent: u64,
    pub finishes_sent: u64,
    pub finish_acks_sent: u64,
    pub cache_hits: u64,
    pub cache_insertions: u64,
    pub transfers_started: u64,
    pub retries: u64,
    pub tasks_registered: u64,
    pub tasks_finished: u64,
    pub tasks_abandoned: u64,
    pub tasks_pending: u64,
    pub mean_fetch_latency_us: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::new(vec![10, 100]);
        h.observe(5);
        h.observe(10);
        h.observe(50);
        h.observe(500);

        assert_eq!(h.count(), 4);
        assert_eq!(h.sum(), 565);
        assert_eq!(h.counts(), vec![(10, 1), (100, 1)]);
        assert_eq!(h.overflow(), 1);
    }

    #[test]
    fn test_per_type_counters() {
        let metrics = CcdnMetrics::new();
        metrics.sent(CmpType::Request).increment();
        metrics.sent(CmpType::Request).increment();
        metrics.received(CmpType::Reject).increment();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_sent, 2);
        assert_eq!(snapshot.rejects_sent, 0);
        assert_eq!(metrics.received(CmpType::Reject).value(), 1);
    }
}
