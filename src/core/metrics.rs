//! Process-wide cell counters
//!
//! Counting is cheap (relaxed atomics) and can be switched off through
//! `RuntimeConfig::enable_metrics`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static METRICS: CellMetrics = CellMetrics::new();
static ENABLED: AtomicBool = AtomicBool::new(true);

/// Access the process-wide counters
pub fn global() -> &'static CellMetrics {
    &METRICS
}

/// Turn counting on or off
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Counters describing cell traffic
#[derive(Debug, Default)]
pub struct CellMetrics {
    /// Cells constructed, pending or pre-resolved
    pub cells_created: AtomicU64,
    /// Terminal transitions to a value
    pub cells_succeeded: AtomicU64,
    /// Terminal transitions to a failure other than cancellation
    pub cells_failed: AtomicU64,
    /// Terminal transitions to cancelled
    pub cells_cancelled: AtomicU64,
    /// Continuations that have fired
    pub continuations_fired: AtomicU64,
    /// Scheduled timeouts that won their race
    pub timeouts_fired: AtomicU64,
    /// Forced overwrites
    pub obtrusions: AtomicU64,
}

impl CellMetrics {
    pub const fn new() -> Self {
        Self {
            cells_created: AtomicU64::new(0),
            cells_succeeded: AtomicU64::new(0),
            cells_failed: AtomicU64::new(0),
            cells_cancelled: AtomicU64::new(0),
            continuations_fired: AtomicU64::new(0),
            timeouts_fired: AtomicU64::new(0),
            obtrusions: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64) {
        if is_enabled() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_created(&self) {
        Self::bump(&self.cells_created);
    }

    pub fn record_succeeded(&self) {
        Self::bump(&self.cells_succeeded);
    }

    pub fn record_failed(&self) {
        Self::bump(&self.cells_failed);
    }

    pub fn record_cancelled(&self) {
        Self::bump(&self.cells_cancelled);
    }

    pub fn record_continuation_fired(&self) {
        Self::bump(&self.continuations_fired);
    }

    pub fn record_timeout_fired(&self) {
        Self::bump(&self.timeouts_fired);
    }

    pub fn record_obtrusion(&self) {
        Self::bump(&self.obtrusions);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cells_created: self.cells_created.load(Ordering::Relaxed),
            cells_succeeded: self.cells_succeeded.load(Ordering::Relaxed),
            cells_failed: self.cells_failed.load(Ordering::Relaxed),
            cells_cancelled: self.cells_cancelled.load(Ordering::Relaxed),
            continuations_fired: self.continuations_fired.load(Ordering::Relaxed),
            timeouts_fired: self.timeouts_fired.load(Ordering::Relaxed),
            obtrusions: self.obtrusions.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.cells_created.store(0, Ordering::Relaxed);
        self.cells_succeeded.store(0, Ordering::Relaxed);
        self.cells_failed.store(0, Ordering::Relaxed);
        self.cells_cancelled.store(0, Ordering::Relaxed);
        self.continuations_fired.store(0, Ordering::Relaxed);
        self.timeouts_fired.store(0, Ordering::Relaxed);
        self.obtrusions.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cells_created: u64,
    pub cells_succeeded: u64,
    pub cells_failed: u64,
    pub cells_cancelled: u64,
    pub continuations_fired: u64,
    pub timeouts_fired: u64,
    pub obtrusions: u64,
}

impl MetricsSnapshot {
    /// Cells that reached any terminal state
    pub fn resolved(&self) -> u64 {
        self.cells_succeeded + self.cells_failed + self.cells_cancelled
    }

    /// Share of resolved cells that succeeded (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        match self.resolved() {
            0 => 0.0,
            n => self.cells_succeeded as f64 / n as f64,
        }
    }

    /// Share of resolved cells that failed or were cancelled (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        match self.resolved() {
            0 => 0.0,
            n => (self.cells_failed + self.cells_cancelled) as f64 / n as f64,
        }
    }
}
