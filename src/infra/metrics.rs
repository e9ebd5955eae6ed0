//! Lock-free counters for the tracking pipeline
//!
//! Every recorder is a single relaxed atomic add; `report()` swaps the
//! per-interval counters back to zero so each summary covers one interval.
//!
//! NOTE: Relaxed ordering is fine here, these are statistics only. Never
//! drive control flow from them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

pub struct Metrics {
    /// Readings that passed the movement filter (monotonic)
    positions_accepted_total: AtomicU64,
    positions_accepted: AtomicU64,
    /// Readings dropped as jitter
    positions_discarded: AtomicU64,
    sensor_faults: AtomicU64,
    sessions_started: AtomicU64,
    nearby_ok: AtomicU64,
    nearby_failed: AtomicU64,
    /// Sum and max of nearby round-trip times (reset on report)
    nearby_latency_sum_ms: AtomicU64,
    nearby_latency_max_ms: AtomicU64,
    geocode_ok: AtomicU64,
    geocode_fallback: AtomicU64,
    last_report_time: Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            positions_accepted_total: AtomicU64::new(0),
            positions_accepted: AtomicU64::new(0),
            positions_discarded: AtomicU64::new(0),
            sensor_faults: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            nearby_ok: AtomicU64::new(0),
            nearby_failed: AtomicU64::new(0),
            nearby_latency_sum_ms: AtomicU64::new(0),
            nearby_latency_max_ms: AtomicU64::new(0),
            geocode_ok: AtomicU64::new(0),
            geocode_fallback: AtomicU64::new(0),
            last_report_time: Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_position_accepted(&self) {
        self.positions_accepted_total.fetch_add(1, Ordering::Relaxed);
        self.positions_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_position_discarded(&self) {
        self.positions_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sensor_fault(&self) {
        self.sensor_faults.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nearby_result(&self, ok: bool, latency_ms: u64) {
        if ok {
            self.nearby_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.nearby_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.nearby_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.nearby_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_geocode(&self, resolved: bool) {
        if resolved {
            self.geocode_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.geocode_fallback.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn positions_accepted_total(&self) -> u64 {
        self.positions_accepted_total.load(Ordering::Relaxed)
    }

    /// Snapshot and reset the per-interval counters
    pub fn report(&self) -> MetricsSummary {
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed().as_secs_f64();
            *last = Instant::now();
            elapsed
        };

        let nearby_ok = self.nearby_ok.swap(0, Ordering::Relaxed);
        let nearby_failed = self.nearby_failed.swap(0, Ordering::Relaxed);
        let latency_sum = self.nearby_latency_sum_ms.swap(0, Ordering::Relaxed);
        let queries = nearby_ok + nearby_failed;

        MetricsSummary {
            interval_secs: elapsed_secs,
            positions_accepted_total: self.positions_accepted_total.load(Ordering::Relaxed),
            positions_accepted: self.positions_accepted.swap(0, Ordering::Relaxed),
            positions_discarded: self.positions_discarded.swap(0, Ordering::Relaxed),
            sensor_faults: self.sensor_faults.swap(0, Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            nearby_ok,
            nearby_failed,
            nearby_avg_latency_ms: if queries > 0 { latency_sum / queries } else { 0 },
            nearby_max_latency_ms: self.nearby_latency_max_ms.swap(0, Ordering::Relaxed),
            geocode_ok: self.geocode_ok.swap(0, Ordering::Relaxed),
            geocode_fallback: self.geocode_fallback.swap(0, Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub interval_secs: f64,
    pub positions_accepted_total: u64,
    pub positions_accepted: u64,
    pub positions_discarded: u64,
    pub sensor_faults: u64,
    pub sessions_started: u64,
    pub nearby_ok: u64,
    pub nearby_failed: u64,
    pub nearby_avg_latency_ms: u64,
    pub nearby_max_latency_ms: u64,
    pub geocode_ok: u64,
    pub geocode_fallback: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            interval_secs = %format!("{:.1}", self.interval_secs),
            accepted_total = %self.positions_accepted_total,
            accepted = %self.positions_accepted,
            discarded = %self.positions_discarded,
            sensor_faults = %self.sensor_faults,
            sessions = %self.sessions_started,
            nearby_ok = %self.nearby_ok,
            nearby_failed = %self.nearby_failed,
            nearby_avg_ms = %self.nearby_avg_latency_ms,
            nearby_max_ms = %self.nearby_max_latency_ms,
            geocode_ok = %self.geocode_ok,
            geocode_fallback = %self.geocode_fallback,
            "metrics"
        );
    }
}
