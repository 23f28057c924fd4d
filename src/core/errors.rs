use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared, cloneable cause of a computation failure.
pub type SharedCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Failure taxonomy observed through a completion cell.
///
/// Every variant is cheap to clone so one failure can be handed to each
/// dependent and to every reader of the cell.
#[derive(Debug, Clone, Error)]
pub enum CellError {
    /// A producer or continuation reported a failure
    #[error("Computation failed: {cause}")]
    Computation {
        #[source]
        cause: SharedCause,
    },

    /// A user closure panicked while the framework was running it
    #[error("Computation panicked: {message}")]
    Panicked { message: String },

    /// The cell, or a cell it depends on, was cancelled
    #[error("Cell was cancelled")]
    Cancelled,

    /// A deadline elapsed before the cell resolved
    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },
}

impl CellError {
    /// Create a computation error from anything `anyhow` can carry
    pub fn computation<E: Into<anyhow::Error>>(err: E) -> Self {
        let err: anyhow::Error = err.into();
        let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into();
        Self::Computation {
            cause: Arc::from(boxed),
        }
    }

    /// Create a computation error from a plain message
    pub fn msg<M: fmt::Display + fmt::Debug + Send + Sync + 'static>(message: M) -> Self {
        Self::computation(anyhow::Error::msg(message))
    }

    /// Create a timeout error
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Convert a caught panic payload into an error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked { message }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for failures raised by user code (returned or panicked)
    pub fn is_computation(&self) -> bool {
        matches!(self, Self::Computation { .. } | Self::Panicked { .. })
    }

    /// The underlying cause, when the failure came from user code
    pub fn cause(&self) -> Option<&SharedCause> {
        match self {
            Self::Computation { cause } => Some(cause),
            _ => None,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Computation { .. } => "computation",
            Self::Panicked { .. } => "panic",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
        }
    }
}

impl From<anyhow::Error> for CellError {
    fn from(err: anyhow::Error) -> Self {
        Self::computation(err)
    }
}

/// Outcome of a resolved cell
pub type Outcome<T> = std::result::Result<T, CellError>;

/// Errors raised while configuring or starting the shared runtime
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration invalid: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Runtime already initialized")]
    AlreadyInitialized,

    #[error("Runtime build failed: {0}")]
    Build(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
