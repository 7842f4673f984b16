// file: src/pipeline/progress.rs
// description: record counters shared by stage workers and the run summary
// reference: atomic counters snapshotted once the pipeline drains

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub records_read: usize,
    pub records_skipped: usize,
    pub records_failed: usize,
    pub records_delivered: usize,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.records_read as f64 * 1000.0 / self.duration_ms as f64
    }

    pub fn delivery_rate(&self) -> f64 {
        if self.records_read == 0 {
            return 0.0;
        }
        (self.records_delivered as f64 / self.records_read as f64) * 100.0
    }
}

/// Counters updated concurrently by the stage workers.
#[derive(Debug)]
pub struct ProgressTracker {
    records_read: AtomicUsize,
    records_skipped: AtomicUsize,
    records_delivered: AtomicUsize,
    started_at: DateTime<Utc>,
    start_time: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            records_read: AtomicUsize::new(0),
            records_skipped: AtomicUsize::new(0),
            records_delivered: AtomicUsize::new(0),
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    pub fn inc_read(&self) {
        self.records_read.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get_stats(&self, records_failed: usize) -> RunStats {
        RunStats {
            records_read: self.records_read.load(Ordering::SeqCst),
            records_skipped: self.records_skipped.load(Ordering::SeqCst),
            records_failed,
            records_delivered: self.records_delivered.load(Ordering::SeqCst),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
            started_at: Some(self.started_at),
        }
    }
}
