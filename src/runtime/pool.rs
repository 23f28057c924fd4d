//! The process-wide tokio runtime behind default executors and timers.
//!
//! The runtime is built lazily from `RuntimeConfig::default()` the first time
//! anything needs it. Call [`init`] before first use to size it explicitly.

use crate::core::config::RuntimeConfig;
use crate::core::errors::{ConfigError, Result};
use crate::core::metrics;
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{error, info};

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Build the shared runtime from `config`.
///
/// Fails with [`ConfigError::AlreadyInitialized`] if the runtime already
/// exists, whether from an earlier `init` or from lazy first use.
pub fn init(config: RuntimeConfig) -> Result<()> {
    config.validate()?;

    let mut built_here = false;
    RUNTIME.get_or_try_init(|| {
        built_here = true;
        build(&config)
    })?;

    if !built_here {
        return Err(ConfigError::AlreadyInitialized);
    }
    metrics::set_enabled(config.enable_metrics);
    Ok(())
}

/// Whether the shared runtime has been built
pub fn is_initialized() -> bool {
    RUNTIME.get().is_some()
}

/// Handle to the shared runtime, building it with defaults if needed
pub fn try_handle() -> Result<Handle> {
    let runtime = RUNTIME.get_or_try_init(|| build(&RuntimeConfig::default()))?;
    Ok(runtime.handle().clone())
}

fn build(config: &RuntimeConfig) -> Result<Runtime> {
    info!(
        worker_threads = config.worker_threads,
        max_blocking_threads = config.max_blocking_threads,
        thread_name = %config.thread_name,
        "Starting cell runtime"
    );

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_keep_alive(config.thread_keep_alive)
        .thread_name(config.thread_name.clone())
        .enable_time()
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to build cell runtime");
            ConfigError::Build(e)
        })
}
