//! Multi-source combinators built on the continuation protocol.
//!
//! Fan-in (`all_of`, `then_combine` and friends) short-circuits on the first
//! failure it observes. Races (`any_of`, `apply_to_either` and friends) take
//! the first source to resolve; every later outcome is observed and dropped.

use crate::cell::completion::CompletionCell;
use crate::cell::continuation::{guarded, Continuation, ContinuationKind, Mode};
use crate::runtime::executor::SharedExecutor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pending halves of a two-source fan-in
struct BothSlots<T, U, F> {
    left: Option<T>,
    right: Option<U>,
    action: Option<(Mode, F)>,
}

impl<T, U, F> BothSlots<T, U, F> {
    /// Hand out both values and the action once, when both sides are present
    fn take_ready(&mut self) -> Option<(T, U, Mode, F)> {
        if self.left.is_none() || self.right.is_none() {
            return None;
        }
        let (mode, action) = self.action.take()?;
        let left = self.left.take()?;
        let right = self.right.take()?;
        Some((left, right, mode, action))
    }
}

fn run_both<T, U, V, F>(ready: Option<(T, U, Mode, F)>, out: CompletionCell<V>)
where
    T: Send + 'static,
    U: Send + 'static,
    V: Clone + Send + 'static,
    F: FnOnce(T, U) -> V + Send + 'static,
{
    if let Some((left, right, mode, action)) = ready {
        mode.run(move || {
            out.resolve(guarded(|| action(left, right)));
        });
    }
}

impl<T: Clone + Send + 'static> CompletionCell<T> {
    /// A cell that completes with `()` once every source succeeds, or fails
    /// with the first failure observed. Resolves immediately for no sources.
    pub fn all_of(cells: &[CompletionCell<T>]) -> CompletionCell<()> {
        let target = CompletionCell::<()>::new();
        if cells.is_empty() {
            target.resolve(Ok(()));
            return target;
        }

        let remaining = Arc::new(AtomicUsize::new(cells.len()));
        for cell in cells {
            let out = target.clone();
            let remaining = Arc::clone(&remaining);
            cell.push(Continuation::new(ContinuationKind::AllOf, move |outcome| {
                match outcome {
                    Ok(_) => {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            out.resolve(Ok(()));
                        }
                    }
                    Err(err) => {
                        out.resolve(Err(err));
                    }
                }
            }));
        }
        target
    }

    /// A cell that takes the outcome of whichever source resolves first.
    /// Stays pending forever for no sources.
    pub fn any_of(cells: &[CompletionCell<T>]) -> CompletionCell<T> {
        let target = CompletionCell::<T>::new();
        for cell in cells {
            let out = target.clone();
            cell.push(Continuation::new(ContinuationKind::AnyOf, move |outcome| {
                out.resolve(outcome);
            }));
        }
        target
    }

    fn both_in<U, V, F>(&self, other: &CompletionCell<U>, mode: Mode, f: F) -> CompletionCell<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let target = self.new_incomplete::<V>();
        let slots = Arc::new(Mutex::new(BothSlots {
            left: None,
            right: None,
            action: Some((mode, f)),
        }));

        let out = target.clone();
        let left_slots = Arc::clone(&slots);
        self.push(Continuation::new(ContinuationKind::Both, move |outcome| match outcome {
            Ok(value) => {
                let ready = {
                    let mut slots = left_slots.lock();
                    slots.left = Some(value);
                    slots.take_ready()
                };
                run_both(ready, out);
            }
            Err(err) => {
                out.resolve(Err(err));
            }
        }));

        let out = target.clone();
        other.push(Continuation::new(ContinuationKind::Both, move |outcome| match outcome {
            Ok(value) => {
                let ready = {
                    let mut slots = slots.lock();
                    slots.right = Some(value);
                    slots.take_ready()
                };
                run_both(ready, out);
            }
            Err(err) => {
                out.resolve(Err(err));
            }
        }));

        target
    }

    fn either_in<U, F>(&self, other: &CompletionCell<T>, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let target = self.new_incomplete::<U>();
        let action = Arc::new(Mutex::new(Some((mode, f))));

        for source in [self, other] {
            let out = target.clone();
            let action = Arc::clone(&action);
            source.push(Continuation::new(ContinuationKind::Either, move |outcome| {
                // Only the first source to fire claims the action.
                let Some((mode, f)) = action.lock().take() else {
                    return;
                };
                match outcome {
                    Ok(value) => mode.run(move || {
                        out.resolve(guarded(|| f(value)));
                    }),
                    Err(err) => {
                        out.resolve(Err(err));
                    }
                }
            }));
        }
        target
    }

    // Both

    /// Combine both values once both cells succeed
    pub fn then_combine<U, V, F>(&self, other: &CompletionCell<U>, f: F) -> CompletionCell<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        self.both_in(other, Mode::Inline, f)
    }

    pub fn then_combine_async<U, V, F>(&self, other: &CompletionCell<U>, f: F) -> CompletionCell<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        self.both_in(other, self.async_mode(), f)
    }

    pub fn then_combine_async_on<U, V, F>(
        &self,
        other: &CompletionCell<U>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        self.both_in(other, Mode::on(executor), f)
    }

    /// Consume both values once both cells succeed
    pub fn then_accept_both<U, F>(&self, other: &CompletionCell<U>, f: F) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T, U) + Send + 'static,
    {
        self.both_in(other, Mode::Inline, f)
    }

    pub fn then_accept_both_async<U, F>(
        &self,
        other: &CompletionCell<U>,
        f: F,
    ) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T, U) + Send + 'static,
    {
        self.both_in(other, self.async_mode(), f)
    }

    pub fn then_accept_both_async_on<U, F>(
        &self,
        other: &CompletionCell<U>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T, U) + Send + 'static,
    {
        self.both_in(other, Mode::on(executor), f)
    }

    /// Run an action once both cells succeed
    pub fn run_after_both<U, F>(&self, other: &CompletionCell<U>, f: F) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.both_in(other, Mode::Inline, move |_, _| f())
    }

    pub fn run_after_both_async<U, F>(&self, other: &CompletionCell<U>, f: F) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.both_in(other, self.async_mode(), move |_, _| f())
    }

    pub fn run_after_both_async_on<U, F>(
        &self,
        other: &CompletionCell<U>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<()>
    where
        U: Clone + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.both_in(other, Mode::on(executor), move |_, _| f())
    }

    // Either

    /// Transform the value of whichever cell resolves first
    pub fn apply_to_either<U, F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.either_in(other, Mode::Inline, f)
    }

    pub fn apply_to_either_async<U, F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.either_in(other, self.async_mode(), f)
    }

    pub fn apply_to_either_async_on<U, F>(
        &self,
        other: &CompletionCell<T>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.either_in(other, Mode::on(executor), f)
    }

    /// Consume the value of whichever cell resolves first
    pub fn accept_either<F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.either_in(other, Mode::Inline, f)
    }

    pub fn accept_either_async<F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.either_in(other, self.async_mode(), f)
    }

    pub fn accept_either_async_on<F>(
        &self,
        other: &CompletionCell<T>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.either_in(other, Mode::on(executor), f)
    }

    /// Run an action once either cell succeeds
    pub fn run_after_either<F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.either_in(other, Mode::Inline, move |_| f())
    }

    pub fn run_after_either_async<F>(&self, other: &CompletionCell<T>, f: F) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.either_in(other, self.async_mode(), move |_| f())
    }

    pub fn run_after_either_async_on<F>(
        &self,
        other: &CompletionCell<T>,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.either_in(other, Mode::on(executor), move |_| f())
    }
}
