//! Dispatch counters and the end-of-run summary.

use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Whether items are published or only rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Publish,
    Validate,
}

/// Counters shared by all workers of one run.
#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        mode: DispatchMode,
        scheduled: u64,
        workers: usize,
        elapsed: Duration,
    ) -> DispatchMetrics {
        DispatchMetrics {
            mode,
            scheduled,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            workers,
            elapsed,
        }
    }
}

/// Metrics from a completed dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    pub mode: DispatchMode,
    /// Items in the schedule.
    pub scheduled: u64,
    /// Items rendered (and published, in publish mode) without error.
    pub succeeded: u64,
    /// Items that failed to render or publish.
    pub failed: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

impl DispatchMetrics {
    /// Scheduled items per second of wall time.
    pub fn messages_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.scheduled as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Flat form written by `--emit-metrics`.
    pub fn to_report(&self) -> MetricsReport {
        MetricsReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            mode: self.mode,
            scheduled: self.scheduled,
            succeeded: self.succeeded,
            failed: self.failed,
            workers: self.workers,
            elapsed_secs: self.elapsed.as_secs_f64(),
            messages_per_second: round3(self.messages_per_second()),
        }
    }

    /// Write the report as pretty JSON.
    pub fn write_report(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_report())?;
        std::fs::write(path, json + "\n")
    }
}

/// Serialized run summary.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// RFC 3339 time the report was built
    pub timestamp: String,
    pub mode: DispatchMode,
    pub scheduled: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub messages_per_second: f64,
}

/// Round to 3 decimals for display.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
