//! Continuations: registered reactions to a cell reaching a terminal state.
//!
//! Each continuation is a closed-set tag plus a type-erased trigger. The tag is
//! only used for diagnostics; behaviour lives in the trigger built by the
//! chaining or combining operation that registered it.

use crate::core::errors::{CellError, Outcome};
use crate::core::metrics;
use crate::runtime::executor::SharedExecutor;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

/// What a registered continuation does with its source outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuationKind {
    /// Value to new value
    Apply,
    /// Value consumed, unit result
    Accept,
    /// Side effect ignoring the value, unit result
    Run,
    /// Value to a new cell whose outcome the target mirrors
    Compose,
    /// Outcome (value or error) to new value
    Handle,
    /// Observer of the outcome; passes it through
    WhenComplete,
    /// Error to recovery value
    Exceptionally,
    /// Error to recovery cell
    ExceptionallyCompose,
    /// Copies the outcome into another cell unchanged
    Relay,
    /// One side of a two-source fan-in
    Both,
    /// One side of a two-source race
    Either,
    /// One input of an `all_of` fan-in
    AllOf,
    /// One input of an `any_of` race
    AnyOf,
    /// Cancels a pending timeout timer
    TimeoutGuard,
    /// Feeds an async waiter
    Await,
}

impl ContinuationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Accept => "accept",
            Self::Run => "run",
            Self::Compose => "compose",
            Self::Handle => "handle",
            Self::WhenComplete => "when_complete",
            Self::Exceptionally => "exceptionally",
            Self::ExceptionallyCompose => "exceptionally_compose",
            Self::Relay => "relay",
            Self::Both => "both",
            Self::Either => "either",
            Self::AllOf => "all_of",
            Self::AnyOf => "any_of",
            Self::TimeoutGuard => "timeout_guard",
            Self::Await => "await",
        }
    }
}

impl fmt::Display for ContinuationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a continuation body runs
#[derive(Clone)]
pub(crate) enum Mode {
    /// On whichever thread triggers the continuation
    Inline,
    /// Handed to an executor
    Async(SharedExecutor),
}

impl Mode {
    pub(crate) fn on(executor: &SharedExecutor) -> Self {
        Self::Async(Arc::clone(executor))
    }

    pub(crate) fn run<F>(&self, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Inline => body(),
            Self::Async(executor) => executor.execute(Box::new(body)),
        }
    }
}

type Trigger<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// A reaction waiting on one source cell
pub(crate) struct Continuation<T> {
    kind: ContinuationKind,
    trigger: Trigger<T>,
}

impl<T> Continuation<T> {
    pub(crate) fn new<F>(kind: ContinuationKind, trigger: F) -> Self
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        Self {
            kind,
            trigger: Box::new(trigger),
        }
    }

    pub(crate) fn kind(&self) -> ContinuationKind {
        self.kind
    }

    /// Consume the continuation, handing it the source outcome
    pub(crate) fn fire(self, source: u64, outcome: Outcome<T>) {
        trace!(cell = source, kind = %self.kind, ok = outcome.is_ok(), "Firing continuation");
        metrics::global().record_continuation_fired();
        (self.trigger)(outcome);
    }
}

/// Run user code, turning a panic into a failed outcome
pub(crate) fn guarded<R, F>(f: F) -> Outcome<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(CellError::from_panic)
}

type Deferred = Box<dyn FnOnce()>;

thread_local! {
    /// Work queued by nested resolutions; `Some` while this thread is draining
    static DEFERRED: RefCell<Option<VecDeque<Deferred>>> = const { RefCell::new(None) };
}

/// Run `job`, flattening nested calls on the same thread into a loop.
///
/// The outermost call runs its job and then everything queued while it ran,
/// in queue order. Inner calls only enqueue, so a chain of inline
/// continuations (or a chain of dropped cells) uses constant stack depth.
pub(crate) fn trampoline<F>(job: F)
where
    F: FnOnce() + 'static,
{
    let mut job = Some(job);
    let nested = DEFERRED.try_with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_mut() {
            Some(queue) => {
                if let Some(job) = job.take() {
                    queue.push_back(Box::new(job));
                }
                true
            }
            None => {
                *slot = Some(VecDeque::new());
                false
            }
        }
    });

    match nested {
        Ok(true) => {}
        Ok(false) => {
            let _drain = DrainGuard;
            if let Some(job) = job.take() {
                job();
            }
            while let Some(next) = next_deferred() {
                next();
            }
        }
        // Thread-local storage is being torn down; nothing left to flatten into.
        Err(_) => {
            if let Some(job) = job.take() {
                job();
            }
        }
    }
}

fn next_deferred() -> Option<Deferred> {
    DEFERRED
        .try_with(|slot| slot.borrow_mut().as_mut().and_then(VecDeque::pop_front))
        .ok()
        .flatten()
}

/// Ends a drain, even when unwinding out of it
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let leftover = DEFERRED.try_with(|slot| slot.borrow_mut().take()).ok().flatten();
        // Dropped outside the borrow: dropping cells may re-enter.
        drop(leftover);
    }
}
