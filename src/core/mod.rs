// Core infrastructure shared by cells and the runtime

pub mod config;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use errors::{CellError, ConfigError, Outcome, Result};
pub use metrics::{CellMetrics, MetricsSnapshot};
