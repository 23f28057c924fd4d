//! Delay scheduling for timeouts and delayed executors.
//!
//! Delays are measured on the shared runtime's timer. When they elapse the job
//! moves to the blocking pool, so a job that completes a cell (and with it any
//! inline continuations) never runs on an async worker.

use crate::runtime::pool;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a pending delayed job.
///
/// Cancelling is best effort: a job whose delay already elapsed still runs.
#[derive(Debug)]
pub struct ScheduledTask {
    timer: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Stop the timer if it has not fired yet
    pub fn cancel(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }

    /// Whether the timer task has ended (fired, cancelled or never tracked)
    pub fn is_finished(&self) -> bool {
        self.timer.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

/// Run `job` once `delay` has elapsed
pub fn schedule_after<F>(delay: Duration, job: F) -> ScheduledTask
where
    F: FnOnce() + Send + 'static,
{
    match pool::try_handle() {
        Ok(handle) => {
            let timer = handle.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    warn!(error = %e, "Delayed job did not finish cleanly");
                }
            });
            ScheduledTask { timer: Some(timer) }
        }
        Err(e) => {
            warn!(error = %e, "Cell runtime unavailable, delaying on a dedicated thread");
            delay_on_thread(delay, job);
            ScheduledTask { timer: None }
        }
    }
}

/// Sleep then run on a fresh thread, or on the caller if no thread can start
fn delay_on_thread<F>(delay: Duration, job: F)
where
    F: FnOnce() + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(job)));
    let remote = Arc::clone(&slot);

    let spawned = thread::Builder::new()
        .name("cellflow-delayer".to_string())
        .spawn(move || {
            thread::sleep(delay);
            if let Some(job) = remote.lock().take() {
                job();
            }
        });

    match spawned {
        Ok(_) => debug!(?delay, "Delayed job handed to dedicated thread"),
        Err(e) => {
            warn!(error = %e, ?delay, "Failed to start delayer thread, delaying on caller");
            thread::sleep(delay);
            if let Some(job) = slot.lock().take() {
                job();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_job_runs_after_delay() {
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        let task = schedule_after(Duration::from_millis(50), move || tx.send(()).unwrap());

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !task.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(task.is_finished());
    }

    #[test]
    fn test_cancel_before_fire() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let task = schedule_after(Duration::from_millis(200), move || {
            flag.store(true, Ordering::SeqCst);
        });

        task.cancel();
        thread::sleep(Duration::from_millis(400));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_fallback_runs_job_once() {
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        delay_on_thread(Duration::from_millis(30), move || tx.send(()).unwrap());

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
