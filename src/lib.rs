//! Composable completion cells.
//!
//! A [`CompletionCell`] holds one asynchronous outcome. It may be resolved
//! once, by anyone, and any number of reactions can be chained onto it before
//! or after that happens. Reactions run inline on the resolving thread or on an
//! [`Executor`]; by default a shared tokio runtime's blocking pool.
//!
//! ```no_run
//! use cellflow::CompletionCell;
//! use std::time::Duration;
//!
//! let price = CompletionCell::supply_async(|| 40);
//! let total = price
//!     .then_apply(|p| p + 2)
//!     .or_timeout(Duration::from_secs(1));
//!
//! assert_eq!(total.get().unwrap(), 42);
//! ```

// Core infrastructure: errors, configuration, counters
pub mod core;

// Executors, the shared runtime and delay scheduling
pub mod runtime;

// Cells, chaining and combinators
pub mod cell;

// Re-exports for convenience
pub use cell::{CellFuture, CellState, CompletionCell, ContinuationKind};
pub use crate::core::config::{RuntimeConfig, RuntimeConfigBuilder};
pub use crate::core::errors::{CellError, ConfigError, Outcome};
pub use crate::core::metrics::{CellMetrics, MetricsSnapshot};
pub use runtime::{
    default_executor, delayed_executor, delayed_executor_on, init, DelayedExecutor, Executor,
    InlineExecutor, Job, RuntimeExecutor, SharedExecutor, ThreadPerTaskExecutor,
};
