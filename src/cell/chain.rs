//! Single-source chaining.
//!
//! Every operation comes in three flavours: plain (runs inline on the thread
//! that resolves the source, or the registering thread if the source already
//! resolved), `_async` (source cell's default executor) and `_async_on`
//! (caller-supplied executor). Upstream failures skip the user callback and
//! pass straight through without an executor hop, except for `handle`,
//! `when_complete` and the `exceptionally` pair, which exist to see them.

use crate::cell::completion::CompletionCell;
use crate::cell::continuation::{guarded, Continuation, ContinuationKind, Mode};
use crate::core::errors::{CellError, Outcome};
use crate::runtime::executor::SharedExecutor;

impl<T: Clone + Send + 'static> CompletionCell<T> {
    /// Shared engine for apply/accept/run: value in, outcome out
    fn transform<U, F>(&self, kind: ContinuationKind, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Outcome<U> + Send + 'static,
    {
        let target = self.new_incomplete::<U>();
        let out = target.clone();
        self.push(Continuation::new(kind, move |outcome| match outcome {
            Ok(value) => mode.run(move || {
                out.resolve(guarded(|| f(value)).and_then(|result| result));
            }),
            Err(err) => {
                out.resolve(Err(err));
            }
        }));
        target
    }

    fn apply_in<U, F>(&self, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.transform(ContinuationKind::Apply, mode, move |value| Ok(f(value)))
    }

    fn try_apply_in<U, F>(&self, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        self.transform(ContinuationKind::Apply, mode, move |value| {
            f(value).map_err(CellError::from)
        })
    }

    fn accept_in<F>(&self, mode: Mode, f: F) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.transform(ContinuationKind::Accept, mode, move |value| {
            f(value);
            Ok(())
        })
    }

    fn run_in<F>(&self, mode: Mode, f: F) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.transform(ContinuationKind::Run, mode, move |_| {
            f();
            Ok(())
        })
    }

    fn compose_in<U, F>(&self, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> CompletionCell<U> + Send + 'static,
    {
        let target = self.new_incomplete::<U>();
        let out = target.clone();
        self.push(Continuation::new(ContinuationKind::Compose, move |outcome| match outcome {
            Ok(value) => mode.run(move || match guarded(|| f(value)) {
                Ok(nested) => nested.relay_to(out),
                Err(err) => {
                    out.resolve(Err(err));
                }
            }),
            Err(err) => {
                out.resolve(Err(err));
            }
        }));
        target
    }

    fn handle_in<U, F>(&self, mode: Mode, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        let target = self.new_incomplete::<U>();
        let out = target.clone();
        self.push(Continuation::new(ContinuationKind::Handle, move |outcome| {
            mode.run(move || {
                out.resolve(guarded(|| f(outcome)));
            })
        }));
        target
    }

    fn when_complete_in<F>(&self, mode: Mode, f: F) -> CompletionCell<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let target = self.new_incomplete::<T>();
        let out = target.clone();
        self.push(Continuation::new(ContinuationKind::WhenComplete, move |outcome| {
            mode.run(move || {
                // An observer that fails replaces the outcome it observed.
                let passed = match guarded(|| f(&outcome)) {
                    Ok(()) => outcome,
                    Err(err) => Err(err),
                };
                out.resolve(passed);
            })
        }));
        target
    }

    fn exceptionally_in<F>(&self, mode: Mode, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> T + Send + 'static,
    {
        let target = self.new_incomplete::<T>();
        let out = target.clone();
        self.push(Continuation::new(ContinuationKind::Exceptionally, move |outcome| match outcome {
            Ok(value) => {
                out.resolve(Ok(value));
            }
            Err(err) => mode.run(move || {
                out.resolve(guarded(|| f(err)));
            }),
        }));
        target
    }

    fn exceptionally_compose_in<F>(&self, mode: Mode, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> CompletionCell<T> + Send + 'static,
    {
        let target = self.new_incomplete::<T>();
        let out = target.clone();
        self.push(Continuation::new(
            ContinuationKind::ExceptionallyCompose,
            move |outcome| match outcome {
                Ok(value) => {
                    out.resolve(Ok(value));
                }
                Err(err) => mode.run(move || match guarded(|| f(err)) {
                    Ok(recovery) => recovery.relay_to(out),
                    Err(panic) => {
                        out.resolve(Err(panic));
                    }
                }),
            },
        ));
        target
    }

    /// A new cell that resolves with this cell's outcome.
    ///
    /// Completing or cancelling the copy never affects this cell.
    pub fn copy(&self) -> CompletionCell<T> {
        let target = self.new_incomplete::<T>();
        self.relay_to(target.clone());
        target
    }

    // Apply

    /// Transform the value once it is available
    pub fn then_apply<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.apply_in(Mode::Inline, f)
    }

    pub fn then_apply_async<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.apply_in(self.async_mode(), f)
    }

    pub fn then_apply_async_on<U, F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.apply_in(Mode::on(executor), f)
    }

    /// Transform the value with a fallible function; an `Err` fails the result
    pub fn then_try_apply<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        self.try_apply_in(Mode::Inline, f)
    }

    pub fn then_try_apply_async<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        self.try_apply_in(self.async_mode(), f)
    }

    pub fn then_try_apply_async_on<U, F>(
        &self,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        self.try_apply_in(Mode::on(executor), f)
    }

    // Accept

    /// Consume the value once it is available
    pub fn then_accept<F>(&self, f: F) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.accept_in(Mode::Inline, f)
    }

    pub fn then_accept_async<F>(&self, f: F) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.accept_in(self.async_mode(), f)
    }

    pub fn then_accept_async_on<F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.accept_in(Mode::on(executor), f)
    }

    // Run

    /// Run an action after successful completion, ignoring the value
    pub fn then_run<F>(&self, f: F) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.run_in(Mode::Inline, f)
    }

    pub fn then_run_async<F>(&self, f: F) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.run_in(self.async_mode(), f)
    }

    pub fn then_run_async_on<F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.run_in(Mode::on(executor), f)
    }

    // Compose

    /// Chain a computation that itself returns a cell, flattening the result
    pub fn then_compose<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> CompletionCell<U> + Send + 'static,
    {
        self.compose_in(Mode::Inline, f)
    }

    pub fn then_compose_async<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> CompletionCell<U> + Send + 'static,
    {
        self.compose_in(self.async_mode(), f)
    }

    pub fn then_compose_async_on<U, F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> CompletionCell<U> + Send + 'static,
    {
        self.compose_in(Mode::on(executor), f)
    }

    // Handle

    /// Map either outcome to a value; the only way to turn a failure into a
    /// success while also seeing successes
    pub fn handle<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        self.handle_in(Mode::Inline, f)
    }

    pub fn handle_async<U, F>(&self, f: F) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        self.handle_in(self.async_mode(), f)
    }

    pub fn handle_async_on<U, F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        self.handle_in(Mode::on(executor), f)
    }

    // WhenComplete

    /// Observe the outcome and pass it on unchanged.
    ///
    /// If the observer panics, the resulting cell fails with that panic
    /// instead.
    pub fn when_complete<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.when_complete_in(Mode::Inline, f)
    }

    pub fn when_complete_async<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.when_complete_in(self.async_mode(), f)
    }

    pub fn when_complete_async_on<F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.when_complete_in(Mode::on(executor), f)
    }

    // Exceptionally

    /// Recover from a failure with a value; successes pass through
    pub fn exceptionally<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> T + Send + 'static,
    {
        self.exceptionally_in(Mode::Inline, f)
    }

    pub fn exceptionally_async<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> T + Send + 'static,
    {
        self.exceptionally_in(self.async_mode(), f)
    }

    pub fn exceptionally_async_on<F>(&self, f: F, executor: &SharedExecutor) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> T + Send + 'static,
    {
        self.exceptionally_in(Mode::on(executor), f)
    }

    /// Recover from a failure with another cell; successes pass through
    pub fn exceptionally_compose<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> CompletionCell<T> + Send + 'static,
    {
        self.exceptionally_compose_in(Mode::Inline, f)
    }

    pub fn exceptionally_compose_async<F>(&self, f: F) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> CompletionCell<T> + Send + 'static,
    {
        self.exceptionally_compose_in(self.async_mode(), f)
    }

    pub fn exceptionally_compose_async_on<F>(
        &self,
        f: F,
        executor: &SharedExecutor,
    ) -> CompletionCell<T>
    where
        F: FnOnce(CellError) -> CompletionCell<T> + Send + 'static,
    {
        self.exceptionally_compose_in(Mode::on(executor), f)
    }
}
