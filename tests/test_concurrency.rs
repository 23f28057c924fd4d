//! Stress tests for racing writers and registrations
//!
//! Each round starts its threads behind a barrier and adds a little random
//! jitter so completion and registration interleave differently every time.

use cellflow::{CellError, CompletionCell, SharedExecutor, ThreadPerTaskExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const ROUNDS: usize = 200;

fn jitter() {
    let spins = fastrand::u32(0..200);
    for _ in 0..spins {
        std::hint::spin_loop();
    }
    if fastrand::bool() {
        thread::yield_now();
    }
}

#[test]
fn test_exactly_one_writer_succeeds() {
    for _ in 0..ROUNDS {
        let cell = CompletionCell::<usize>::new();
        let wins = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let cell = cell.clone();
                let wins = Arc::clone(&wins);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    jitter();
                    let won = match i {
                        0 => cell.cancel(false),
                        1 => cell.complete_exceptionally(CellError::msg("writer 1")),
                        _ => cell.complete(i),
                    };
                    if won {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(cell.is_done());
    }
}

#[test]
fn test_no_missed_wakeups() {
    for _ in 0..ROUNDS {
        let cell = CompletionCell::<u32>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(3));

        let registrars: Vec<_> = (0..2)
            .map(|_| {
                let cell = cell.clone();
                let fired = Arc::clone(&fired);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..5 {
                        jitter();
                        let fired = Arc::clone(&fired);
                        cell.then_accept(move |_| {
                            fired.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        barrier.wait();
        jitter();
        cell.complete(1);

        for registrar in registrars {
            registrar.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert_eq!(cell.dependent_count(), 0);
    }
}

#[test]
fn test_blocked_readers_all_wake() {
    let cell = CompletionCell::<String>::new();
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cell = cell.clone();
            thread::spawn(move || cell.get_timeout(Duration::from_secs(5)))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    cell.complete("done".to_string());

    for reader in readers {
        assert_eq!(reader.join().unwrap().unwrap(), "done");
    }
}

#[test]
fn test_all_of_under_concurrent_completion() {
    let executor: SharedExecutor = Arc::new(ThreadPerTaskExecutor::new("stress"));
    for _ in 0..20 {
        let cells: Vec<_> = (0..16)
            .map(|i| {
                CompletionCell::supply_async_on(
                    move || {
                        jitter();
                        i
                    },
                    &executor,
                )
            })
            .collect();

        let sources = cells.clone();
        let sum = CompletionCell::all_of(&cells)
            .then_apply(move |()| sources.iter().map(|c| c.peek_or(0).unwrap_or(0)).sum::<i32>());
        assert_eq!(sum.get_timeout(Duration::from_secs(5)).unwrap(), 120);
    }
}

#[test]
fn test_either_action_runs_once_under_race() {
    for _ in 0..ROUNDS {
        let left = CompletionCell::<u8>::new();
        let right = CompletionCell::<u8>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = left.apply_to_either(&right, move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v
        });

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [(left, 1u8), (right, 2u8)]
            .into_iter()
            .map(|(cell, value)| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    jitter();
                    cell.complete(value);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(result.get().unwrap(), 1 | 2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
