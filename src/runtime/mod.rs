//! Execution backends: the shared runtime, stock executors and delay scheduling

pub mod executor;
pub mod pool;
pub mod scheduler;

pub use executor::{
    default_executor, delayed_executor, delayed_executor_on, DelayedExecutor, Executor,
    InlineExecutor, Job, RuntimeExecutor, SharedExecutor, ThreadPerTaskExecutor,
};
pub use pool::{init, is_initialized, try_handle};
pub use scheduler::{schedule_after, ScheduledTask};
