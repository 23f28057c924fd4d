//! Where each chaining family runs its callback
//!
//! Plain variants run on the thread that resolves the source, `_async`
//! variants on the source cell's executor (inherited by derived cells) and
//! `_async_on` variants on the executor passed in. Callbacks report the name
//! of the thread they ran on; families that do not produce a value are
//! followed by an inline `then_apply`, which runs on the same thread.

use cellflow::{CellError, CompletionCell, SharedExecutor, ThreadPerTaskExecutor};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Cell = CompletionCell<String>;
type Build = fn(&Cell, &SharedExecutor) -> [Cell; 3];

const PRODUCER: &str = "producer";
const INHERITED: &str = "inherited-";
const GIVEN: &str = "given-";

fn ran_on() -> String {
    thread::current().name().unwrap_or("unnamed").to_string()
}

/// Build every variant against a pending source, then resolve the source
/// from a thread named `producer` and check where each variant ran.
fn check(family: &str, fail_source: bool, build: Build, expected: [&str; 3]) {
    let inherited: SharedExecutor = Arc::new(ThreadPerTaskExecutor::new("inherited"));
    let given: SharedExecutor = Arc::new(ThreadPerTaskExecutor::new("given"));
    let source = Cell::with_executor(inherited);
    let variants = build(&source, &given);

    let producer = source.clone();
    thread::Builder::new()
        .name(PRODUCER.to_string())
        .spawn(move || {
            if fail_source {
                producer.complete_exceptionally(CellError::msg("source failed"));
            } else {
                producer.complete("value".to_string());
            }
        })
        .unwrap()
        .join()
        .unwrap();

    for (variant, prefix) in variants.into_iter().zip(expected) {
        let thread_name = variant
            .get_timeout(Duration::from_secs(5))
            .unwrap_or_else(|e| panic!("{family}: variant failed: {e}"));
        assert!(
            thread_name.starts_with(prefix),
            "{family}: expected a thread starting with {prefix:?}, ran on {thread_name:?}"
        );
    }
}

#[test]
fn test_value_families_follow_their_mode() {
    let families: &[(&str, Build)] = &[
        ("then_apply", |s, g| {
            [
                s.then_apply(|_| ran_on()),
                s.then_apply_async(|_| ran_on()),
                s.then_apply_async_on(|_| ran_on(), g),
            ]
        }),
        ("then_try_apply", |s, g| {
            [
                s.then_try_apply(|_| Ok(ran_on())),
                s.then_try_apply_async(|_| Ok(ran_on())),
                s.then_try_apply_async_on(|_| Ok(ran_on()), g),
            ]
        }),
        ("then_accept", |s, g| {
            [
                s.then_accept(|_| {}).then_apply(|()| ran_on()),
                s.then_accept_async(|_| {}).then_apply(|()| ran_on()),
                s.then_accept_async_on(|_| {}, g).then_apply(|()| ran_on()),
            ]
        }),
        ("then_run", |s, g| {
            [
                s.then_run(|| {}).then_apply(|()| ran_on()),
                s.then_run_async(|| {}).then_apply(|()| ran_on()),
                s.then_run_async_on(|| {}, g).then_apply(|()| ran_on()),
            ]
        }),
        ("then_compose", |s, g| {
            [
                s.then_compose(|_| CompletionCell::completed(ran_on())),
                s.then_compose_async(|_| CompletionCell::completed(ran_on())),
                s.then_compose_async_on(|_| CompletionCell::completed(ran_on()), g),
            ]
        }),
        ("handle", |s, g| {
            [
                s.handle(|_| ran_on()),
                s.handle_async(|_| ran_on()),
                s.handle_async_on(|_| ran_on(), g),
            ]
        }),
        ("when_complete", |s, g| {
            [
                s.when_complete(|_| {}).then_apply(|_| ran_on()),
                s.when_complete_async(|_| {}).then_apply(|_| ran_on()),
                s.when_complete_async_on(|_| {}, g).then_apply(|_| ran_on()),
            ]
        }),
        ("derived cell", |s, g| {
            let derived = s.then_apply(|v| v);
            [
                derived.then_apply(|_| ran_on()),
                derived.then_apply_async(|_| ran_on()),
                derived.then_apply_async_on(|_| ran_on(), g),
            ]
        }),
    ];

    for (family, build) in families {
        check(family, false, *build, [PRODUCER, INHERITED, GIVEN]);
    }
}

#[test]
fn test_pair_families_follow_their_mode() {
    let families: &[(&str, Build)] = &[
        ("then_combine", |s, g| {
            let other = CompletionCell::completed(1);
            [
                s.then_combine(&other, |_, _| ran_on()),
                s.then_combine_async(&other, |_, _| ran_on()),
                s.then_combine_async_on(&other, |_, _| ran_on(), g),
            ]
        }),
        ("then_accept_both", |s, g| {
            let other = CompletionCell::completed(1);
            [
                s.then_accept_both(&other, |_, _| {}).then_apply(|()| ran_on()),
                s.then_accept_both_async(&other, |_, _| {}).then_apply(|()| ran_on()),
                s.then_accept_both_async_on(&other, |_, _| {}, g)
                    .then_apply(|()| ran_on()),
            ]
        }),
        ("run_after_both", |s, g| {
            let other = CompletionCell::completed(1);
            [
                s.run_after_both(&other, || {}).then_apply(|()| ran_on()),
                s.run_after_both_async(&other, || {}).then_apply(|()| ran_on()),
                s.run_after_both_async_on(&other, || {}, g).then_apply(|()| ran_on()),
            ]
        }),
        ("apply_to_either", |s, g| {
            let never = Cell::new();
            [
                s.apply_to_either(&never, |_| ran_on()),
                s.apply_to_either_async(&never, |_| ran_on()),
                s.apply_to_either_async_on(&never, |_| ran_on(), g),
            ]
        }),
        ("accept_either", |s, g| {
            let never = Cell::new();
            [
                s.accept_either(&never, |_| {}).then_apply(|()| ran_on()),
                s.accept_either_async(&never, |_| {}).then_apply(|()| ran_on()),
                s.accept_either_async_on(&never, |_| {}, g).then_apply(|()| ran_on()),
            ]
        }),
        ("run_after_either", |s, g| {
            let never = Cell::new();
            [
                s.run_after_either(&never, || {}).then_apply(|()| ran_on()),
                s.run_after_either_async(&never, || {}).then_apply(|()| ran_on()),
                s.run_after_either_async_on(&never, || {}, g).then_apply(|()| ran_on()),
            ]
        }),
    ];

    for (family, build) in families {
        check(family, false, *build, [PRODUCER, INHERITED, GIVEN]);
    }
}

#[test]
fn test_recovery_families_follow_their_mode() {
    let families: &[(&str, Build)] = &[
        ("exceptionally", |s, g| {
            [
                s.exceptionally(|_| ran_on()),
                s.exceptionally_async(|_| ran_on()),
                s.exceptionally_async_on(|_| ran_on(), g),
            ]
        }),
        ("exceptionally_compose", |s, g| {
            [
                s.exceptionally_compose(|_| CompletionCell::completed(ran_on())),
                s.exceptionally_compose_async(|_| CompletionCell::completed(ran_on())),
                s.exceptionally_compose_async_on(|_| CompletionCell::completed(ran_on()), g),
            ]
        }),
        ("handle on failure", |s, g| {
            [
                s.handle(|_| ran_on()),
                s.handle_async(|_| ran_on()),
                s.handle_async_on(|_| ran_on(), g),
            ]
        }),
    ];

    for (family, build) in families {
        check(family, true, *build, [PRODUCER, INHERITED, GIVEN]);
    }
}

#[test]
fn test_skipped_callbacks_do_not_hop_executors() {
    // The observing `handle` is inline, so it reports the thread that
    // resolved the intermediate cell.
    let failed_source: &[(&str, Build)] = &[
        ("then_apply", |s, g| {
            [
                s.then_apply(|v| v).handle(|_| ran_on()),
                s.then_apply_async(|v| v).handle(|_| ran_on()),
                s.then_apply_async_on(|v| v, g).handle(|_| ran_on()),
            ]
        }),
        ("then_compose", |s, g| {
            [
                s.then_compose(CompletionCell::completed).handle(|_| ran_on()),
                s.then_compose_async(CompletionCell::completed).handle(|_| ran_on()),
                s.then_compose_async_on(CompletionCell::completed, g)
                    .handle(|_| ran_on()),
            ]
        }),
        ("then_combine", |s, g| {
            let other = CompletionCell::completed(1);
            [
                s.then_combine(&other, |v, _| v).handle(|_| ran_on()),
                s.then_combine_async(&other, |v, _| v).handle(|_| ran_on()),
                s.then_combine_async_on(&other, |v, _| v, g).handle(|_| ran_on()),
            ]
        }),
    ];
    for (family, build) in failed_source {
        check(family, true, *build, [PRODUCER, PRODUCER, PRODUCER]);
    }

    let succeeded_source: &[(&str, Build)] = &[("exceptionally", |s, g| {
        [
            s.exceptionally(|e| e.to_string()).handle(|_| ran_on()),
            s.exceptionally_async(|e| e.to_string()).handle(|_| ran_on()),
            s.exceptionally_async_on(|e| e.to_string(), g).handle(|_| ran_on()),
        ]
    })];
    for (family, build) in succeeded_source {
        check(family, false, *build, [PRODUCER, PRODUCER, PRODUCER]);
    }
}
