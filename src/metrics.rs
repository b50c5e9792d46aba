//! Per-worker execution statistics.
//!
//! # Design
//!
//! - **Per-worker stats, worker-written**: each worker owns one slot and is
//!   its only writer during a phase. Updates are relaxed atomic ops, cheap
//!   and the controller's diagnostic reads stay defined even if they land
//!   mid-phase (they are only meaningful after the completion rendezvous).
//! - **Cache-line aligned**: the slots live in one contiguous array, so each
//!   is wrapped in [`CachePadded`] to keep adjacent workers' hot counters
//!   off shared cache lines.
//! - **Post-phase aggregation**: the controller folds the slots into a
//!   [`StatsSnapshot`] after the completion edge, so aggregation never
//!   contends with workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Milliseconds elapsed since `started`.
#[inline]
pub(crate) fn millis_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// One worker's execution counters.
///
/// The worker id is stable for the worker's lifetime; the counters describe
/// the most recent phase and are reset to initial values when the worker
/// exits.
#[derive(Debug)]
pub struct WorkerStats {
    worker_id: usize,
    tasks_processed: AtomicU64,
    tasks_panicked: AtomicU64,
    phase_millis: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            tasks_processed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            phase_millis: AtomicU64::new(0),
        }
    }

    /// Stable identifier assigned at spawn, in `0..thread_count`.
    #[inline]
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Tasks this worker claimed and ran in its most recent phase.
    #[inline]
    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Relaxed)
    }

    /// Of those, tasks whose callable panicked (contained by the worker).
    #[inline]
    pub fn tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Wall-clock milliseconds the worker spent in its most recent phase.
    #[inline]
    pub fn phase_millis(&self) -> u64 {
        self.phase_millis.load(Ordering::Relaxed)
    }

    pub(crate) fn begin_phase(&self) {
        self.tasks_processed.store(0, Ordering::Relaxed);
        self.tasks_panicked.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_task(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked_task(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_phase_millis(&self, millis: u64) {
        self.phase_millis.store(millis, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.tasks_processed.store(0, Ordering::Relaxed);
        self.tasks_panicked.store(0, Ordering::Relaxed);
        self.phase_millis.store(0, Ordering::Relaxed);
    }
}

/// One worker's row in a [`StatsSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPhase {
    pub worker_id: usize,
    pub tasks_processed: u64,
    pub tasks_panicked: u64,
    pub phase_millis: u64,
}

/// Controller-side aggregation of every worker's most recent phase.
#[derive(Clone, Debug, Default)]
pub struct StatsSnapshot {
    /// Per-worker rows, ordered by worker id.
    pub workers: Vec<WorkerPhase>,
    /// Tasks processed across all workers.
    pub total_tasks: u64,
    /// Tasks that panicked across all workers.
    pub total_panicked: u64,
    /// The slowest worker's phase duration, i.e. the phase's critical path.
    pub slowest_phase_millis: u64,
}

impl StatsSnapshot {
    /// Folds the per-worker slots into a snapshot. Call after a phase's
    /// completion rendezvous; mid-phase values are stale but defined.
    pub(crate) fn collect(stats: &[CachePadded<WorkerStats>]) -> Self {
        let workers: Vec<WorkerPhase> = stats
            .iter()
            .map(|stats| WorkerPhase {
                worker_id: stats.worker_id(),
                tasks_processed: stats.tasks_processed(),
                tasks_panicked: stats.tasks_panicked(),
                phase_millis: stats.phase_millis(),
            })
            .collect();

        let total_tasks = workers.iter().map(|row| row.tasks_processed).sum();
        let total_panicked = workers.iter().map(|row| row.tasks_panicked).sum();
        let slowest_phase_millis = workers
            .iter()
            .map(|row| row.phase_millis)
            .max()
            .unwrap_or(0);

        Self {
            workers,
            total_tasks,
            total_panicked,
            slowest_phase_millis,
        }
    }
}
