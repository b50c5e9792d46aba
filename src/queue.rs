//! Fixed-capacity task queue with a CAS-guarded claim cursor.
//!
//! # Design
//!
//! The queue is filled by one controller thread before a processing phase
//! and drained concurrently by every worker thread during it. The slot
//! sequence is structurally immutable while a phase runs; the only shared
//! mutable state on the hot path is the claim cursor, protected by a
//! spin-acquired exclusion flag rather than a blocking mutex. The guarded
//! region is an index read and increment, so the critical section is O(1)
//! and the spin is short even under full contention.
//!
//! # Key properties
//!
//! - **Fixed capacity**: storage is reserved exactly once. No growth means
//!   no reallocation hazard while claims are in flight.
//! - **Exactly-once claims**: within one phase every slot is handed to
//!   exactly one claimer, in ascending index order.
//! - **Non-blocking exhaustion**: `claim_next` on an exhausted queue returns
//!   `None` without waiting. That is the claimer's "no more work" signal,
//!   never an error.
//! - **Single-writer fill**: `add_task`, `begin_processing`, and `clear`
//!   take `&mut self`, so the single-controller contract is enforced at
//!   compile time.
//!
//! # Ordering rationale
//!
//! ```text
//! Claimer CASes guard true (Acquire)  →  sees all cursor writes made under
//!                                        previous guard holds
//! Claimer stores guard false (Release) → publishes its cursor write to the
//!                                        next guard holder
//! ```
//!
//! Cursor loads and stores inside the guarded region are `Relaxed`; the
//! guard's Acquire/Release pair carries the ordering.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::errors::QueueError;

/// Contended-claim retry hint. Under loom this must yield so the model can
/// schedule the guard holder.
#[inline]
fn claim_backoff() {
    #[cfg(not(loom))]
    std::hint::spin_loop();

    #[cfg(loom)]
    loom::thread::yield_now();
}

/// A single queued work item.
///
/// The callable is opaque to the scheduler: zero arguments, no return value,
/// no captured scheduler state. The last-execution duration is written by
/// whichever worker claims the slot; the claim partition guarantees one
/// writer per phase, and a relaxed atomic keeps the cross-phase diagnostic
/// read defined.
pub struct Task {
    run: Box<dyn Fn() + Send + Sync>,
    last_duration_ms: AtomicU64,
}

impl Task {
    fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            run: Box::new(run),
            last_duration_ms: AtomicU64::new(0),
        }
    }

    /// Invokes the task's callable.
    #[inline]
    pub fn invoke(&self) {
        (self.run)();
    }

    /// Records how long the last invocation took. Called by the claiming
    /// worker after `invoke` returns.
    #[inline]
    pub(crate) fn record_duration_ms(&self, millis: u64) {
        self.last_duration_ms.store(millis, Ordering::Relaxed);
    }

    /// Duration of the most recent invocation, in milliseconds.
    ///
    /// Meaningful after the phase's completion rendezvous; reads elsewhere
    /// see a stale but well-defined value.
    #[inline]
    pub fn last_duration_ms(&self) -> u64 {
        self.last_duration_ms.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("last_duration_ms", &self.last_duration_ms())
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity ordered task sequence with a lock-free claim cursor.
///
/// # Invariants
///
/// - `capacity` is immutable for the queue's lifetime; `slots.len()` never
///   exceeds it.
/// - `cursor` is monotonically non-decreasing within one phase and reset to
///   zero only by `begin_processing` or `clear`.
/// - `cursor` is read or written only while `claim_guard` is held, except
///   through `&mut self` receivers (which prove no claimer exists).
/// - The slot sequence does not change between `begin_processing` and the
///   end of the phase.
pub struct TaskQueue {
    slots: Vec<Task>,
    capacity: usize,
    /// Index of the next unclaimed slot. Padded so claim traffic does not
    /// fight the guard's cache line.
    cursor: CachePadded<AtomicUsize>,
    /// Single-holder exclusion flag for the cursor. `false` = free.
    claim_guard: CachePadded<AtomicBool>,
}

impl TaskQueue {
    /// Creates a queue that can hold exactly `capacity` tasks.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: CachePadded::new(AtomicUsize::new(0)),
            claim_guard: CachePadded::new(AtomicBool::new(false)),
        })
    }

    /// Appends a task, failing without mutation when the queue is full.
    ///
    /// Controller-only: callers must not race this with an in-flight phase,
    /// which the `&mut` receiver enforces.
    pub fn add_task<F>(&mut self, run: F) -> Result<(), QueueError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.slots.len() == self.capacity {
            return Err(QueueError::AtCapacity {
                capacity: self.capacity,
            });
        }

        self.slots.push(Task::new(run));
        Ok(())
    }

    /// Resets the claim cursor for a new phase and returns the number of
    /// tasks awaiting processing.
    ///
    /// Called exactly once per phase, by the controller, before any worker
    /// is released.
    pub fn begin_processing(&mut self) -> usize {
        self.cursor.store(0, Ordering::Relaxed);
        self.slots.len()
    }

    /// Claims the next unprocessed task, or `None` when the queue is
    /// exhausted. Safe for concurrent invocation by every worker.
    pub fn claim_next(&self) -> Option<&Task> {
        while self
            .claim_guard
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            claim_backoff();
        }

        let next = self.cursor.load(Ordering::Relaxed);
        let claimed = if next < self.slots.len() {
            self.cursor.store(next + 1, Ordering::Relaxed);
            Some(next)
        } else {
            None
        };

        self.claim_guard.store(false, Ordering::Release);

        claimed.map(|index| &self.slots[index])
    }

    /// Post-phase hook. Currently nothing to do; the seam stays so
    /// end-of-phase bookkeeping has a home when it grows one.
    pub fn end_processing(&mut self) {}

    /// Drops all tasks and resets the cursor. Idempotent; capacity is
    /// retained.
    pub fn clear(&mut self) {
        self.cursor.store(0, Ordering::Relaxed);
        self.slots.clear();
    }

    /// The fixed number of tasks this queue can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no tasks are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates the queued tasks in submission order, e.g. to read recorded
    /// durations after a phase.
    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.slots.iter()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
#[path = "queue_tests.rs"]
mod queue_tests;

// ============================================================================
// Loom Tests
// ============================================================================

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::thread;
    use std::sync::Arc;

    fn filled_queue(tasks: usize) -> TaskQueue {
        let mut queue = TaskQueue::new(tasks).unwrap();
        for _ in 0..tasks {
            queue.add_task(|| {}).unwrap();
        }
        queue.begin_processing();
        queue
    }

    fn drain(queue: &TaskQueue) -> Vec<usize> {
        let mut seen = Vec::new();
        while let Some(task) = queue.claim_next() {
            seen.push(task as *const Task as usize);
        }
        seen
    }

    /// Two racing claimers over three tasks: every task claimed exactly
    /// once, no task skipped. Loom explores all interleavings of the guard
    /// CAS and cursor accesses.
    #[test]
    fn racing_claimers_partition_all_tasks() {
        // Small task count so loom can exhaust the schedule space.
        const TASKS: usize = 3;

        loom::model(|| {
            let queue = Arc::new(filled_queue(TASKS));
            let queue2 = Arc::clone(&queue);

            let handle = thread::spawn(move || drain(&queue2));

            let mut claimed = drain(&queue);
            claimed.extend(handle.join().unwrap());

            claimed.sort_unstable();
            claimed.dedup();
            assert_eq!(claimed.len(), TASKS, "each task claimed exactly once");
            assert!(queue.claim_next().is_none());
        });
    }

    /// A claimer that arrives after exhaustion must observe `None`, never a
    /// stale slot.
    #[test]
    fn late_claimer_sees_exhaustion() {
        loom::model(|| {
            let queue = Arc::new(filled_queue(1));
            let queue2 = Arc::clone(&queue);

            let handle = thread::spawn(move || queue2.claim_next().is_some());
            let won_main = queue.claim_next().is_some();
            let won_thread = handle.join().unwrap();

            assert!(won_main ^ won_thread, "exactly one claimer wins the slot");
            assert!(queue.claim_next().is_none());
        });
    }
}
