//! Deadlines that race normal completion.
//!
//! Both operations arm a timer on the shared runtime and register a guard
//! continuation that aborts the timer once the cell resolves some other way.
//! Whichever side writes first wins.

use crate::cell::completion::CompletionCell;
use crate::cell::continuation::{Continuation, ContinuationKind};
use crate::core::errors::{CellError, Outcome};
use crate::core::metrics;
use crate::runtime::scheduler::schedule_after;
use std::time::Duration;
use tracing::debug;

impl<T: Clone + Send + 'static> CompletionCell<T> {
    /// Fail this cell with [`CellError::Timeout`] unless it resolves within
    /// `timeout`. Returns the same cell.
    pub fn or_timeout(&self, timeout: Duration) -> Self {
        self.arm_deadline(timeout, move || Err(CellError::timeout(timeout)));
        self.clone()
    }

    /// Complete this cell with `value` unless it resolves within `timeout`.
    /// Returns the same cell.
    pub fn complete_on_timeout(&self, value: T, timeout: Duration) -> Self {
        self.arm_deadline(timeout, move || Ok(value));
        self.clone()
    }

    fn arm_deadline<F>(&self, timeout: Duration, fallback: F)
    where
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        if self.is_done() {
            return;
        }

        let cell = self.clone();
        let task = schedule_after(timeout, move || {
            if cell.resolve(fallback()) {
                metrics::global().record_timeout_fired();
                debug!(cell = cell.id(), ?timeout, "Deadline resolved cell");
            }
        });

        self.push(Continuation::new(ContinuationKind::TimeoutGuard, move |_| {
            task.cancel();
        }));
    }
}
