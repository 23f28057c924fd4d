//! Completion cells and everything that reacts to them

pub mod chain;
pub mod combinators;
pub mod completion;
pub mod continuation;
pub mod future;
pub mod timeout;

pub use completion::{CellState, CompletionCell};
pub use continuation::ContinuationKind;
pub use future::CellFuture;
