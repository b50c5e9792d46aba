//! Phase synchronization for a fixed set of worker threads.
//!
//! # Design
//!
//! One [`PhaseSync`] coordinates a controller and exactly `total_threads`
//! workers across three rendezvous protocols:
//!
//! - **Ready**: each worker reports once after spawning; the controller
//!   blocks until all have. One-shot per scheduler lifetime.
//! - **Execute / completion**: the controller resets the completion counter,
//!   advances the phase epoch, and broadcasts, all under one lock hold, so
//!   no worker can observe the broadcast before the reset. It then waits for
//!   `total_threads` completion reports, bounded by a millisecond timeout
//!   when nonzero (0 = wait forever).
//! - **Exit**: a broadcast-only variant for teardown. Exiting workers never
//!   report completion, so nothing waits on them here.
//!
//! # No lost wakeups
//!
//! Workers wait on a phase *epoch*, not on a bare condition variable. A
//! worker that re-enters `wait_execute` after the controller has already
//! broadcast sees the advanced epoch and returns immediately; a worker
//! parked inside gets the notification. Spurious wakeups are absorbed by
//! the epoch predicate, and the worker's command check on return is the
//! second line of defense.
//!
//! # On timeout
//!
//! The barrier only reports that completion was not observed in time. It
//! does not cancel or unwind workers; recovery belongs to the caller.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Completion counter and phase epoch, guarded by one mutex so the counter
/// reset and the epoch advance are a single atomic step from any worker's
/// point of view.
struct ExecState {
    /// Monotonic phase counter; advanced by `notify_execute`/`notify_exit`.
    epoch: u64,
    /// Workers that have reported completion for the current phase.
    completed: usize,
}

/// Synchronization primitive coordinating one controller and a fixed set of
/// worker threads across ready, execute, and completion rendezvous points.
pub struct PhaseSync {
    total_threads: usize,

    ready: Mutex<usize>,
    ready_cv: Condvar,

    exec: Mutex<ExecState>,
    /// Wakes workers parked in `wait_execute`.
    execute_cv: Condvar,
    /// Wakes the controller parked in `notify_execute`.
    completion_cv: Condvar,
}

impl PhaseSync {
    /// Epoch a freshly spawned worker passes to its first `wait_execute`.
    pub const INITIAL_EPOCH: u64 = 0;

    /// Creates a barrier for exactly `total_threads` workers. The participant
    /// count is fixed for the barrier's lifetime.
    pub fn new(total_threads: usize) -> Self {
        debug_assert!(total_threads > 0, "barrier needs at least one participant");

        Self {
            total_threads,
            ready: Mutex::new(0),
            ready_cv: Condvar::new(),
            exec: Mutex::new(ExecState {
                epoch: Self::INITIAL_EPOCH,
                completed: 0,
            }),
            execute_cv: Condvar::new(),
            completion_cv: Condvar::new(),
        }
    }

    /// The fixed participant count.
    #[inline]
    pub fn total_threads(&self) -> usize {
        self.total_threads
    }

    fn lock_exec(&self) -> MutexGuard<'_, ExecState> {
        self.exec.lock().expect("exec mutex poisoned")
    }

    /// Worker-side: reports that this worker has spawned and entered its
    /// command loop. Called exactly once per worker.
    pub fn notify_ready(&self) {
        let mut ready = self.ready.lock().expect("ready mutex poisoned");
        *ready += 1;
        if *ready == self.total_threads {
            self.ready_cv.notify_one();
        }
    }

    /// Controller-side: blocks until every worker has reported ready.
    pub fn wait_ready(&self) {
        let ready = self.ready.lock().expect("ready mutex poisoned");
        let _ready = self
            .ready_cv
            .wait_while(ready, |count| *count != self.total_threads)
            .expect("ready mutex poisoned");
    }

    /// Controller-side: releases all workers into the posted phase, then
    /// waits for every worker's completion report.
    ///
    /// `timeout_ms` of 0 waits forever; a nonzero value bounds the
    /// completion wait in milliseconds. Returns whether completion was
    /// observed in time. Commands must be posted to every worker before
    /// calling this.
    pub fn notify_execute(&self, timeout_ms: u64) -> bool {
        let mut state = self.lock_exec();
        state.completed = 0;
        state.epoch = state.epoch.wrapping_add(1);
        self.execute_cv.notify_all();

        if timeout_ms == 0 {
            let _state = self
                .completion_cv
                .wait_while(state, |state| state.completed != self.total_threads)
                .expect("exec mutex poisoned");
            return true;
        }

        let (_state, timeout) = self
            .completion_cv
            .wait_timeout_while(state, Duration::from_millis(timeout_ms), |state| {
                state.completed != self.total_threads
            })
            .expect("exec mutex poisoned");

        !timeout.timed_out()
    }

    /// Worker-side: blocks until the phase epoch advances past `seen_epoch`;
    /// returns the new epoch for the next wait.
    ///
    /// A worker that arrives after the broadcast (it was still finishing the
    /// previous phase) returns immediately instead of sleeping through a
    /// wakeup it already missed.
    pub fn wait_execute(&self, seen_epoch: u64) -> u64 {
        let state = self.lock_exec();
        let state = self
            .execute_cv
            .wait_while(state, |state| state.epoch == seen_epoch)
            .expect("exec mutex poisoned");
        state.epoch
    }

    /// Worker-side: reports completion of this phase's share of work.
    /// Called exactly once per phase per worker; the last report wakes the
    /// controller.
    pub fn notify_complete(&self) {
        let mut state = self.lock_exec();
        state.completed += 1;
        if state.completed == self.total_threads {
            self.completion_cv.notify_one();
        }
    }

    /// Controller-side teardown: wakes every worker without waiting for
    /// completion. Use this, not `notify_execute`, for the Exit command;
    /// exiting workers never report completion.
    pub fn notify_exit(&self) {
        let mut state = self.lock_exec();
        state.completed = 0;
        state.epoch = state.epoch.wrapping_add(1);
        self.execute_cv.notify_all();
    }
}

impl std::fmt::Debug for PhaseSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseSync")
            .field("total_threads", &self.total_threads)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_ready_blocks_until_all_workers_report() {
        const WORKERS: usize = 4;

        let sync = Arc::new(PhaseSync::new(WORKERS));
        let reported = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let sync = Arc::clone(&sync);
                let reported = Arc::clone(&reported);
                thread::spawn(move || {
                    reported.fetch_add(1, Ordering::SeqCst);
                    sync.notify_ready();
                })
            })
            .collect();

        sync.wait_ready();
        assert_eq!(reported.load(Ordering::SeqCst), WORKERS);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn execute_rendezvous_completes_when_all_workers_report() {
        const WORKERS: usize = 2;

        let sync = Arc::new(PhaseSync::new(WORKERS));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let epoch = sync.wait_execute(PhaseSync::INITIAL_EPOCH);
                    sync.notify_complete();
                    epoch
                })
            })
            .collect();

        // 0 = wait forever; both workers must be released and counted.
        assert!(sync.notify_execute(0));

        for handle in handles {
            assert_eq!(handle.join().unwrap(), PhaseSync::INITIAL_EPOCH + 1);
        }
    }

    #[test]
    fn late_waiter_observes_past_broadcast() {
        let sync = PhaseSync::new(1);

        // Broadcast with nobody waiting, then time out on completion.
        assert!(!sync.notify_execute(10));

        // A worker arriving afterwards must not sleep through the wakeup it
        // missed.
        let started = Instant::now();
        let epoch = sync.wait_execute(PhaseSync::INITIAL_EPOCH);
        assert_eq!(epoch, PhaseSync::INITIAL_EPOCH + 1);
        assert!(started.elapsed().as_millis() < 1000, "must not block");
    }

    #[test]
    fn completion_timeout_reports_failure() {
        let sync = PhaseSync::new(1);

        let started = Instant::now();
        assert!(!sync.notify_execute(20));
        assert!(started.elapsed().as_millis() >= 20);
    }

    #[test]
    fn notify_exit_wakes_workers_without_completion_wait() {
        let sync = Arc::new(PhaseSync::new(1));
        let worker = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.wait_execute(PhaseSync::INITIAL_EPOCH))
        };

        sync.notify_exit();
        assert_eq!(worker.join().unwrap(), PhaseSync::INITIAL_EPOCH + 1);
    }

    #[test]
    fn epochs_advance_across_phases() {
        let sync = Arc::new(PhaseSync::new(1));

        let worker = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || {
                let mut epoch = PhaseSync::INITIAL_EPOCH;
                for _ in 0..3 {
                    epoch = sync.wait_execute(epoch);
                    sync.notify_complete();
                }
                epoch
            })
        };

        for _ in 0..3 {
            assert!(sync.notify_execute(0));
        }

        assert_eq!(worker.join().unwrap(), PhaseSync::INITIAL_EPOCH + 3);
    }
}
