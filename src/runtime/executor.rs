use crate::runtime::{pool, scheduler};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, warn};

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted work eventually, possibly on another thread.
///
/// Submission is fire-and-forget: the caller never learns when or where the
/// job ran. Cells rely on nothing else.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

/// Executor shared between cells
pub type SharedExecutor = Arc<dyn Executor>;

static DEFAULT_EXECUTOR: OnceCell<SharedExecutor> = OnceCell::new();

/// The executor used by `_async` variants unless a cell was given another.
///
/// Backed by the shared runtime's blocking pool. Falls back to one thread per
/// job if the runtime cannot be started.
pub fn default_executor() -> SharedExecutor {
    DEFAULT_EXECUTOR
        .get_or_init(|| match pool::try_handle() {
            Ok(handle) => Arc::new(RuntimeExecutor::new(handle)),
            Err(e) => {
                error!(error = %e, "Cell runtime unavailable, using thread-per-task executor");
                Arc::new(ThreadPerTaskExecutor::new("cellflow-fallback"))
            }
        })
        .clone()
}

/// An executor that submits to the default executor after `delay`
pub fn delayed_executor(delay: Duration) -> SharedExecutor {
    Arc::new(DelayedExecutor::new(delay, default_executor()))
}

/// An executor that submits to `base` after `delay`
pub fn delayed_executor_on(delay: Duration, base: &SharedExecutor) -> SharedExecutor {
    Arc::new(DelayedExecutor::new(delay, Arc::clone(base)))
}

/// Runs jobs on a tokio runtime's blocking pool so callbacks may block freely
pub struct RuntimeExecutor {
    handle: Handle,
}

impl RuntimeExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor over the runtime the caller is currently inside
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for RuntimeExecutor {
    fn execute(&self, job: Job) {
        // Detached; the cell observes the outcome, not the join handle.
        drop(self.handle.spawn_blocking(job));
    }
}

/// Spawns a fresh named OS thread for every job
pub struct ThreadPerTaskExecutor {
    name_prefix: String,
    spawned: AtomicUsize,
}

impl ThreadPerTaskExecutor {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Number of threads this executor has started
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Executor for ThreadPerTaskExecutor {
    fn execute(&self, job: Job) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Mutex::new(Some(job)));
        let remote = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, n))
            .spawn(move || {
                if let Some(job) = remote.lock().take() {
                    job();
                }
            });

        if let Err(e) = spawned {
            // A job must never be dropped silently: its cell would stay pending.
            warn!(error = %e, "Thread spawn failed, running job on submitting thread");
            if let Some(job) = slot.lock().take() {
                job();
            }
        }
    }
}

/// Runs every job immediately on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Submits jobs to a base executor once a delay has elapsed
pub struct DelayedExecutor {
    delay: Duration,
    base: SharedExecutor,
}

impl DelayedExecutor {
    pub fn new(delay: Duration, base: SharedExecutor) -> Self {
        Self { delay, base }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Executor for DelayedExecutor {
    fn execute(&self, job: Job) {
        let base = Arc::clone(&self.base);
        scheduler::schedule_after(self.delay, move || base.execute(job));
    }
}
