//! The completion cell state machine.
//!
//! A cell's outcome and its list of waiting continuations live behind one
//! mutex. Completion and registration both take that lock, so a continuation
//! is either appended before the terminal transition (and drained by it) or
//! sees the terminal outcome and fires immediately. Continuations always fire
//! outside the lock, in registration order. Firing goes through a per-thread
//! trampoline, so long inline chains resolve in a loop rather than by
//! recursion.

use crate::cell::continuation::{guarded, trampoline, Continuation, ContinuationKind, Mode};
use crate::core::errors::{CellError, Outcome};
use crate::core::metrics;
use crate::runtime::executor::{default_executor, SharedExecutor};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of where a cell is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl CellState {
    fn of<T>(outcome: Option<&Outcome<T>>) -> Self {
        match outcome {
            None => Self::Pending,
            Some(Ok(_)) => Self::Succeeded,
            Some(Err(CellError::Cancelled)) => Self::Cancelled,
            Some(Err(_)) => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Holder of one asynchronous outcome.
///
/// Handles are cheap to clone and all refer to the same cell. Use
/// [`CompletionCell::copy`] for an independent mirror.
pub struct CompletionCell<T: 'static> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: 'static> {
    id: u64,
    state: Mutex<State<T>>,
    resolved: Condvar,
    executor: SharedExecutor,
}

struct State<T> {
    outcome: Option<Outcome<T>>,
    dependents: Vec<Continuation<T>>,
}

impl<T: 'static> Clone for CompletionCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Drop for Inner<T> {
    fn drop(&mut self) {
        // Unfired continuations own their target cells; release them one
        // level at a time.
        let dependents = mem::take(&mut self.state.get_mut().dependents);
        if !dependents.is_empty() {
            trampoline(move || drop(dependents));
        }
    }
}

impl<T: Clone + Send + 'static> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> CompletionCell<T> {
    /// A pending cell using the default executor
    pub fn new() -> Self {
        Self::with_executor(default_executor())
    }

    /// A pending cell whose `_async` variants use `executor`
    pub fn with_executor(executor: SharedExecutor) -> Self {
        Self::build(None, executor)
    }

    /// A cell already resolved with `value`
    pub fn completed(value: T) -> Self {
        Self::build(Some(Ok(value)), default_executor())
    }

    /// A cell already resolved with `error`
    pub fn failed(error: CellError) -> Self {
        Self::build(Some(Err(error)), default_executor())
    }

    fn build(outcome: Option<Outcome<T>>, executor: SharedExecutor) -> Self {
        let id = NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed);
        let stats = metrics::global();
        stats.record_created();
        if let Some(outcome) = &outcome {
            record_transition(outcome);
        }
        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(State {
                    outcome,
                    dependents: Vec::new(),
                }),
                resolved: Condvar::new(),
                executor,
            }),
        }
    }

    /// Run `supplier` on the default executor and resolve a fresh cell with it
    pub fn supply_async<F>(supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::new().complete_async(supplier)
    }

    /// Run `supplier` on `executor` and resolve a fresh cell with it
    pub fn supply_async_on<F>(supplier: F, executor: &SharedExecutor) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::new().complete_async_on(supplier, executor)
    }

    /// Like [`supply_async`](Self::supply_async) for a fallible supplier
    pub fn try_supply_async<F>(supplier: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Self::try_supply_async_on(supplier, &default_executor())
    }

    /// Like [`supply_async_on`](Self::supply_async_on) for a fallible supplier
    pub fn try_supply_async_on<F>(supplier: F, executor: &SharedExecutor) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let cell = Self::new();
        let target = cell.clone();
        executor.execute(Box::new(move || {
            let outcome = guarded(supplier).and_then(|r| r.map_err(CellError::from));
            target.resolve(outcome);
        }));
        cell
    }

    /// Process-unique id, used in log fields
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Executor used by this cell's `_async` variants
    pub fn default_executor(&self) -> SharedExecutor {
        Arc::clone(&self.inner.executor)
    }

    /// A fresh pending cell sharing this cell's default executor
    pub fn new_incomplete<U: Clone + Send + 'static>(&self) -> CompletionCell<U> {
        CompletionCell::with_executor(self.default_executor())
    }

    pub(crate) fn async_mode(&self) -> Mode {
        Mode::Async(self.default_executor())
    }

    /// Resolve with `value`. Returns true iff this call ended the pending state.
    pub fn complete(&self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Resolve with `error`. Returns true iff this call ended the pending state.
    pub fn complete_exceptionally(&self, error: CellError) -> bool {
        self.resolve(Err(error))
    }

    /// Resolve as cancelled if still pending.
    ///
    /// `may_interrupt` is recorded in the log only: work already running on an
    /// executor is never interrupted. Dependents observe [`CellError::Cancelled`].
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        let cancelled = self.resolve(Err(CellError::Cancelled));
        if cancelled {
            debug!(cell = self.inner.id, may_interrupt, "Cell cancelled");
        }
        cancelled
    }

    /// Run `supplier` on the default executor and complete this cell with its
    /// result. Returns this cell.
    pub fn complete_async<F>(&self, supplier: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.complete_async_on(supplier, &self.default_executor())
    }

    /// Run `supplier` on `executor` and complete this cell with its result.
    /// Returns this cell.
    pub fn complete_async_on<F>(&self, supplier: F, executor: &SharedExecutor) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let target = self.clone();
        executor.execute(Box::new(move || {
            target.resolve(guarded(supplier));
        }));
        self.clone()
    }

    /// First-writer-wins terminal transition shared by every completion path
    pub(crate) fn resolve(&self, outcome: Outcome<T>) -> bool {
        let dependents = {
            let mut state = self.inner.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            mem::take(&mut state.dependents)
        };
        self.inner.resolved.notify_all();

        record_transition(&outcome);
        trace!(
            cell = self.inner.id,
            state = ?CellState::of(Some(&outcome)),
            dependents = dependents.len(),
            "Cell resolved"
        );
        self.fire_all(dependents, outcome);
        true
    }

    /// Force the outcome to `value`, even if the cell already resolved.
    ///
    /// This deliberately breaks the exactly-once guarantee and exists for
    /// debugging and tests. Readers that already observed the old outcome are
    /// not notified again; continuations registered afterwards see the new one.
    pub fn obtrude_value(&self, value: T) {
        self.obtrude(Ok(value));
    }

    /// Force the outcome to `error`; see [`obtrude_value`](Self::obtrude_value)
    pub fn obtrude_error(&self, error: CellError) {
        self.obtrude(Err(error));
    }

    fn obtrude(&self, outcome: Outcome<T>) {
        let (previous, dependents) = {
            let mut state = self.inner.state.lock();
            let previous = CellState::of(state.outcome.as_ref());
            state.outcome = Some(outcome.clone());
            (previous, mem::take(&mut state.dependents))
        };
        self.inner.resolved.notify_all();

        metrics::global().record_obtrusion();
        warn!(
            cell = self.inner.id,
            ?previous,
            next = ?CellState::of(Some(&outcome)),
            "Cell outcome obtruded"
        );
        self.fire_all(dependents, outcome);
    }

    fn fire_all(&self, dependents: Vec<Continuation<T>>, outcome: Outcome<T>) {
        if dependents.is_empty() {
            return;
        }
        let source = self.inner.id;
        trampoline(move || {
            for dependent in dependents {
                dependent.fire(source, outcome.clone());
            }
        });
    }

    /// Register a continuation, firing it now if the cell already resolved
    pub(crate) fn push(&self, continuation: Continuation<T>) {
        let ready = {
            let mut state = self.inner.state.lock();
            if state.outcome.is_none() {
                trace!(cell = self.inner.id, kind = %continuation.kind(), "Continuation registered");
                state.dependents.push(continuation);
                return;
            }
            state.outcome.clone()
        };
        if let Some(outcome) = ready {
            continuation.fire(self.inner.id, outcome);
        }
    }

    /// Copy this cell's eventual outcome into `target`
    pub(crate) fn relay_to(&self, target: CompletionCell<T>) {
        self.push(Continuation::new(ContinuationKind::Relay, move |outcome| {
            target.resolve(outcome);
        }));
    }

    /// Block until the cell resolves.
    ///
    /// Fails with [`CellError::Cancelled`] for cancelled cells and with the
    /// recorded failure for failed ones.
    pub fn get(&self) -> Outcome<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            self.inner.resolved.wait(&mut state);
        }
    }

    /// Same as [`get`](Self::get).
    ///
    /// Both report failures through the returned `Result`, so there is no
    /// separate unchecked flavour.
    pub fn join(&self) -> Outcome<T> {
        self.get()
    }

    /// Block until the cell resolves or `timeout` elapses.
    ///
    /// The deadline check and the outcome read happen under the cell lock, so
    /// a resolution racing the deadline yields exactly one answer.
    pub fn get_timeout(&self, timeout: Duration) -> Outcome<T> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.get(),
        };

        let mut state = self.inner.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            if self
                .inner
                .resolved
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return match &state.outcome {
                    Some(outcome) => outcome.clone(),
                    None => Err(CellError::timeout(timeout)),
                };
            }
        }
    }

    /// The outcome if already resolved, without blocking
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.inner.state.lock().outcome.clone()
    }

    /// The outcome if already resolved, otherwise `Ok(default)`
    pub fn peek_or(&self, default: T) -> Outcome<T> {
        self.peek().unwrap_or(Ok(default))
    }

    pub fn state(&self) -> CellState {
        CellState::of(self.inner.state.lock().outcome.as_ref())
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == CellState::Cancelled
    }

    /// True for any non-value outcome, cancellation included
    pub fn is_failed(&self) -> bool {
        matches!(self.state(), CellState::Failed | CellState::Cancelled)
    }

    /// Number of continuations registered and not yet fired
    pub fn dependent_count(&self) -> usize {
        self.inner.state.lock().dependents.len()
    }
}

impl CompletionCell<()> {
    /// Run `action` on the default executor; the cell completes when it returns
    pub fn run_async<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::supply_async(action)
    }

    /// Run `action` on `executor`; the cell completes when it returns
    pub fn run_async_on<F>(action: F, executor: &SharedExecutor) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::supply_async_on(action, executor)
    }
}

impl<T: 'static> fmt::Debug for CompletionCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CompletionCell")
            .field("id", &self.inner.id)
            .field("state", &CellState::of(state.outcome.as_ref()))
            .field("dependents", &state.dependents.len())
            .finish()
    }
}

fn record_transition<T>(outcome: &Outcome<T>) {
    let stats = metrics::global();
    match outcome {
        Ok(_) => stats.record_succeeded(),
        Err(CellError::Cancelled) => stats.record_cancelled(),
        Err(_) => stats.record_failed(),
    }
}
