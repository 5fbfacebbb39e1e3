use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::Stage;

/// Timing samples kept per series; averages and percentiles cover the most recent ones
const MAX_SAMPLES: usize = 1024;

#[derive(Default)]
struct Samples {
    recent: VecDeque<u64>,
}

impl Samples {
    fn push(&mut self, value: u64) {
        if self.recent.len() == MAX_SAMPLES {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
    }

    fn avg(&self) -> u64 {
        if self.recent.is_empty() {
            return 0;
        }
        self.recent.iter().sum::<u64>() / self.recent.len() as u64
    }

    fn percentile(&self, p: f64) -> u64 {
        if self.recent.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.recent.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p) as usize;
        sorted[idx]
    }
}

/// Metrics collector for pipeline runs.
///
/// Tracks backend calls, retries, rate-limit waits, stage durations and run
/// outcomes. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Backend call metrics
    calls_total: AtomicUsize,
    calls_success: AtomicUsize,
    calls_failed: AtomicUsize,
    call_latency_ms: RwLock<Samples>,
    retries: AtomicUsize,

    // Per-service call counters
    service_calls: DashMap<String, AtomicUsize>,

    // Rate limiting
    rate_limit_waits: AtomicUsize,
    rate_limit_wait_ms: AtomicU64,

    // Stage metrics
    stage_duration_ms: DashMap<Stage, Samples>,

    // Extensions and data repairs
    extension_failures: AtomicUsize,
    invariant_repairs: AtomicUsize,
    degradations: AtomicUsize,

    // Run metrics
    runs_completed: AtomicUsize,
    runs_cancelled: AtomicUsize,
    runs_failed: AtomicUsize,
    regions_processed: AtomicUsize,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                calls_total: AtomicUsize::new(0),
                calls_success: AtomicUsize::new(0),
                calls_failed: AtomicUsize::new(0),
                call_latency_ms: RwLock::new(Samples::default()),
                retries: AtomicUsize::new(0),
                service_calls: DashMap::new(),
                rate_limit_waits: AtomicUsize::new(0),
                rate_limit_wait_ms: AtomicU64::new(0),
                stage_duration_ms: DashMap::new(),
                extension_failures: AtomicUsize::new(0),
                invariant_repairs: AtomicUsize::new(0),
                degradations: AtomicUsize::new(0),
                runs_completed: AtomicUsize::new(0),
                runs_cancelled: AtomicUsize::new(0),
                runs_failed: AtomicUsize::new(0),
                regions_processed: AtomicUsize::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    // Backend call metrics
    pub fn record_backend_call(&self, service: &str, success: bool, duration: Duration) {
        self.inner.calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.call_latency_ms.write().push(duration.as_millis() as u64);
        self.inner
            .service_calls
            .entry(service.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.inner.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_wait(&self, waited: Duration) {
        if waited.is_zero() {
            return;
        }
        self.inner.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
        self.inner
            .rate_limit_wait_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
    }

    // Stage metrics
    pub fn record_stage_duration(&self, stage: Stage, duration: Duration) {
        self.inner
            .stage_duration_ms
            .entry(stage)
            .or_default()
            .push(duration.as_millis() as u64);
    }

    pub fn record_extension_failure(&self) {
        self.inner.extension_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invariant_repair(&self) {
        self.inner.invariant_repairs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degradations(&self, count: usize) {
        self.inner.degradations.fetch_add(count, Ordering::Relaxed);
    }

    // Run metrics
    pub fn record_run_completed(&self, regions: usize) {
        self.inner.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.inner.regions_processed.fetch_add(regions, Ordering::Relaxed);
    }

    pub fn record_run_cancelled(&self) {
        self.inner.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_failed(&self) {
        self.inner.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.call_latency_ms.read();
        let call_latency_avg_ms = latency.avg();
        let call_latency_p95_ms = latency.percentile(0.95);
        drop(latency);

        let stage_avg_ms = self
            .inner
            .stage_duration_ms
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().avg()))
            .collect();

        let service_calls = self
            .inner
            .service_calls
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            calls_total: self.inner.calls_total.load(Ordering::Relaxed),
            calls_success: self.inner.calls_success.load(Ordering::Relaxed),
            calls_failed: self.inner.calls_failed.load(Ordering::Relaxed),
            call_latency_avg_ms,
            call_latency_p95_ms,
            retries: self.inner.retries.load(Ordering::Relaxed),
            service_calls,
            rate_limit_waits: self.inner.rate_limit_waits.load(Ordering::Relaxed),
            rate_limit_wait_ms: self.inner.rate_limit_wait_ms.load(Ordering::Relaxed),
            stage_avg_ms,
            extension_failures: self.inner.extension_failures.load(Ordering::Relaxed),
            invariant_repairs: self.inner.invariant_repairs.load(Ordering::Relaxed),
            degradations: self.inner.degradations.load(Ordering::Relaxed),
            runs_completed: self.inner.runs_completed.load(Ordering::Relaxed),
            runs_cancelled: self.inner.runs_cancelled.load(Ordering::Relaxed),
            runs_failed: self.inner.runs_failed.load(Ordering::Relaxed),
            regions_processed: self.inner.regions_processed.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let counters = [
            ("backend_calls_total", "Total backend calls", snapshot.calls_total as u64),
            ("backend_calls_success", "Successful backend calls", snapshot.calls_success as u64),
            ("backend_calls_failed", "Failed backend calls", snapshot.calls_failed as u64),
            ("backend_retries_total", "Backend call retries", snapshot.retries as u64),
            ("rate_limit_waits_total", "Calls delayed by the rate limiter", snapshot.rate_limit_waits as u64),
            ("rate_limit_wait_ms_total", "Time spent waiting on the rate limiter", snapshot.rate_limit_wait_ms),
            ("extension_failures_total", "Extension callbacks that failed", snapshot.extension_failures as u64),
            ("invariant_repairs_total", "Array length repairs after boundaries", snapshot.invariant_repairs as u64),
            ("degradations_total", "Stage fallbacks taken", snapshot.degradations as u64),
            ("runs_completed_total", "Completed pipeline runs", snapshot.runs_completed as u64),
            ("runs_cancelled_total", "Cancelled pipeline runs", snapshot.runs_cancelled as u64),
            ("runs_failed_total", "Failed pipeline runs", snapshot.runs_failed as u64),
            ("regions_processed_total", "Regions in completed runs", snapshot.regions_processed as u64),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}\n# TYPE {name} counter\n{name} {{}} {value}\n");
        }

        let _ = writeln!(
            out,
            "# HELP backend_latency_avg_ms Average backend latency in milliseconds\n# TYPE backend_latency_avg_ms gauge\nbackend_latency_avg_ms {{}} {}\n",
            snapshot.call_latency_avg_ms
        );

        let _ = writeln!(
            out,
            "# HELP stage_avg_duration_ms Average stage duration in milliseconds\n# TYPE stage_avg_duration_ms gauge"
        );
        for (stage, value) in &snapshot.stage_avg_ms {
            let _ = writeln!(out, "stage_avg_duration_ms {{stage=\"{stage}\"}} {value}");
        }

        let _ = writeln!(
            out,
            "\n# HELP service_calls_total Backend calls per service\n# TYPE service_calls_total counter"
        );
        for (service, value) in &snapshot.service_calls {
            let _ = writeln!(out, "service_calls_total {{service=\"{service}\"}} {value}");
        }

        let _ = writeln!(
            out,
            "\n# HELP uptime_seconds Uptime in seconds\n# TYPE uptime_seconds counter\nuptime_seconds {{}} {}",
            snapshot.uptime_seconds
        );
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub calls_total: usize,
    pub calls_success: usize,
    pub calls_failed: usize,
    pub call_latency_avg_ms: u64,
    pub call_latency_p95_ms: u64,
    pub retries: usize,
    pub service_calls: BTreeMap<String, usize>,
    pub rate_limit_waits: usize,
    pub rate_limit_wait_ms: u64,
    pub stage_avg_ms: BTreeMap<String, u64>,
    pub extension_failures: usize,
    pub invariant_repairs: usize,
    pub degradations: usize,
    pub runs_completed: usize,
    pub runs_cancelled: usize,
    pub runs_failed: usize,
    pub regions_processed: usize,
    pub uptime_seconds: u64,
}
