//! Awaiting cells from async code.

use crate::cell::completion::CompletionCell;
use crate::cell::continuation::{Continuation, ContinuationKind};
use crate::core::errors::{CellError, Outcome};
use futures::channel::oneshot;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future resolving to a cell's outcome.
///
/// Polling never blocks a runtime thread. If the cell is dropped while still
/// pending the future resolves to [`CellError::Cancelled`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct CellFuture<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
}

impl<T> Future for CellFuture<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(CellError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: Clone + Send + 'static> CompletionCell<T> {
    /// A future for this cell's outcome
    pub fn to_future(&self) -> CellFuture<T> {
        let (sender, receiver) = oneshot::channel();
        self.push(Continuation::new(ContinuationKind::Await, move |outcome| {
            // Receiver gone means nobody is waiting any more.
            let _ = sender.send(outcome);
        }));
        CellFuture { receiver }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for CompletionCell<T> {
    type Output = Outcome<T>;
    type IntoFuture = CellFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.to_future()
    }
}
