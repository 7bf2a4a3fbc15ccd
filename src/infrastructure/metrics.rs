//! Store metrics and monitoring
//!
//! Coordinator events (optimistic reads, fallbacks, writes) sit on the hot
//! path and are plain atomics. Query timings go through a lock-protected map
//! and are only recorded when enabled.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counter padded to its own cache line so concurrent readers bumping
/// different counters do not false-share.
#[repr(align(64))]
#[derive(Default)]
struct AlignedCounter(AtomicU64);

impl AlignedCounter {
    #[inline]
    fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Most recent measurements kept per timing for percentiles
const SAMPLE_WINDOW: usize = 1024;

/// Running aggregates for one timing plus a bounded window of recent samples
#[derive(Debug, Clone, Default)]
struct TimingSamples {
    count: usize,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    recent: VecDeque<Duration>,
}

impl TimingSamples {
    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.min = Some(self.min.map_or(duration, |min| min.min(duration)));
        self.max = self.max.max(duration);
        if self.recent.len() == SAMPLE_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(duration);
    }
}

/// Metrics collector shared by a store and its coordinator
pub struct StoreMetrics {
    optimistic_reads: AlignedCounter,
    fallback_reads: AlignedCounter,
    writes: AlignedCounter,

    /// Timing aggregates, keyed by operation name
    timings: RwLock<HashMap<String, TimingSamples>>,
    timings_enabled: AtomicBool,

    /// Free-form counters (maintenance runs, saves, ...)
    counters: RwLock<HashMap<String, u64>>,

    start_time: Instant,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self {
            optimistic_reads: AlignedCounter::default(),
            fallback_reads: AlignedCounter::default(),
            writes: AlignedCounter::default(),
            timings: RwLock::new(HashMap::new()),
            timings_enabled: AtomicBool::new(false),
            counters: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Collector that also records per-query timings
    pub fn with_timings() -> Self {
        let metrics = Self::new();
        metrics.set_timings_enabled(true);
        metrics
    }

    pub fn set_timings_enabled(&self, enabled: bool) {
        self.timings_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn timings_enabled(&self) -> bool {
        self.timings_enabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_optimistic_read(&self) {
        self.optimistic_reads.incr();
    }

    #[inline]
    pub(crate) fn record_fallback_read(&self) {
        self.fallback_reads.incr();
    }

    #[inline]
    pub(crate) fn record_write(&self) {
        self.writes.incr();
    }

    /// Reads that validated without taking the lock
    pub fn optimistic_reads(&self) -> u64 {
        self.optimistic_reads.get()
    }

    /// Reads that had to retry under the shared lock
    pub fn fallback_reads(&self) -> u64 {
        self.fallback_reads.get()
    }

    pub fn writes(&self) -> u64 {
        self.writes.get()
    }

    /// Record a timing measurement
    pub fn record_timing(&self, name: impl Into<String>, duration: Duration) {
        let mut timings = self.timings.write();
        timings.entry(name.into()).or_default().record(duration);
    }

    pub fn increment(&self, name: impl Into<String>) {
        self.add(name, 1);
    }

    pub fn add(&self, name: impl Into<String>, value: u64) {
        let mut counters = self.counters.write();
        *counters.entry(name.into()).or_default() += value;
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    pub fn get_timing_stats(&self, name: &str) -> Option<TimingStats> {
        let timings = self.timings.read();
        timings.get(name).map(TimingStats::from_samples)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn reset(&self) {
        self.optimistic_reads.reset();
        self.fallback_reads.reset();
        self.writes.reset();
        self.timings.write().clear();
        self.counters.write().clear();
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut counters = self.counters.read().clone();
        counters.insert("reads.optimistic".to_string(), self.optimistic_reads());
        counters.insert("reads.fallback".to_string(), self.fallback_reads());
        counters.insert("writes".to_string(), self.writes());

        let timings = self
            .timings
            .read()
            .iter()
            .map(|(name, samples)| (name.clone(), TimingStats::from_samples(samples)))
            .collect();

        MetricsSummary {
            uptime: self.uptime(),
            timings,
            counters,
        }
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for timing measurements
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub count: usize,
    pub total: Duration,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl TimingStats {
    /// Count, total, mean, min and max cover every measurement; percentiles
    /// cover the most recent window.
    fn from_samples(samples: &TimingSamples) -> Self {
        if samples.count == 0 {
            return Self {
                count: 0,
                total: Duration::ZERO,
                mean: Duration::ZERO,
                min: Duration::ZERO,
                max: Duration::ZERO,
                p50: Duration::ZERO,
                p95: Duration::ZERO,
                p99: Duration::ZERO,
            };
        }

        let mut sorted: Vec<Duration> = samples.recent.iter().copied().collect();
        sorted.sort();

        let window = sorted.len();
        let percentile = |p: f64| sorted[((window as f64 * p) as usize).min(window - 1)];

        Self {
            count: samples.count,
            total: samples.total,
            mean: samples.total.div_f64(samples.count as f64),
            min: samples.min.unwrap_or(Duration::ZERO),
            max: samples.max,
            p50: percentile(0.50),
            p95: percentile(0.95),
            p99: percentile(0.99),
        }
    }
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime: Duration,
    pub timings: HashMap<String, TimingStats>,
    pub counters: HashMap<String, u64>,
}

impl MetricsSummary {
    /// Human-readable report, names sorted for stable output
    pub fn report(&self) -> String {
        let mut lines = vec![
            format!("Uptime: {:.2?}", self.uptime),
            String::new(),
            "=== Timings ===".to_string(),
        ];

        let mut timing_names: Vec<_> = self.timings.keys().collect();
        timing_names.sort();
        for name in timing_names {
            let stats = &self.timings[name];
            lines.push(format!("{}:", name));
            lines.push(format!("  count: {}", stats.count));
            lines.push(format!("  mean:  {:.2?}", stats.mean));
            lines.push(format!("  p50:   {:.2?}", stats.p50));
            lines.push(format!("  p95:   {:.2?}", stats.p95));
            lines.push(format!("  max:   {:.2?}", stats.max));
        }

        lines.push(String::new());
        lines.push("=== Counters ===".to_string());

        let mut counter_names: Vec<_> = self.counters.keys().collect();
        counter_names.sort();
        for name in counter_names {
            lines.push(format!("{}: {}", name, self.counters[name]));
        }

        lines.join("\n")
    }
}

/// RAII timer; records into `metrics` on drop when timings are enabled
pub struct Timer<'a> {
    metrics: &'a StoreMetrics,
    name: &'static str,
    start: Option<Instant>,
}

impl<'a> Timer<'a> {
    pub fn new(metrics: &'a StoreMetrics, name: &'static str) -> Self {
        let start = metrics.timings_enabled().then(Instant::now);
        Self { metrics, name, start }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            self.metrics.record_timing(self.name, start.elapsed());
        }
    }
}
