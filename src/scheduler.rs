//! Scheduler façade: owns the queue, the barrier, and the worker pool.
//!
//! # Lifecycle
//!
//! ```text
//! new ──initialize──► initialized ──(create_task* ─ execute)*──► shutdown
//!                          ▲                                        │
//!                          └────────────── re-initialize ───────────┘
//! ```
//!
//! `execute` runs one processing phase: reset the claim cursor, post an
//! Execute command to every worker, release them through the barrier, and
//! wait for the completion rendezvous. Tasks persist across phases; the
//! same batch runs every frame until `shutdown` clears it.
//!
//! # Timeout is fatal
//!
//! A phase that misses its completion bound leaves some worker possibly
//! stuck inside a task that never returns. Rather than keep dispatching
//! into a wedged pool, the scheduler tears itself down: Exit is posted,
//! healthy workers unwind on their own, and the stuck thread is abandoned
//! instead of joined (a join would inherit the hang). The instance must be
//! re-initialized before further use.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::CachePadded;

use crate::config::SchedulerConfig;
use crate::errors::SchedulerError;
use crate::metrics::{millis_since, StatsSnapshot, WorkerStats};
use crate::queue::TaskQueue;
use crate::sync::PhaseSync;
use crate::worker::{Command, Worker};

/// Fixed-pool, frame-oriented task scheduler.
///
/// One controller thread drives the scheduler; `thread_count` long-lived
/// workers execute the queued tasks each phase. The pool size is fixed at
/// `initialize` and never resized.
pub struct Scheduler {
    config: SchedulerConfig,
    workers: Vec<Worker>,
    queue: Option<Arc<TaskQueue>>,
    sync: Option<Arc<PhaseSync>>,
    stats: Option<Arc<[CachePadded<WorkerStats>]>>,
    execution_time_ms: u64,
}

impl Scheduler {
    /// Creates an uninitialized scheduler with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            workers: Vec::new(),
            queue: None,
            sync: None,
            stats: None,
            execution_time_ms: 0,
        }
    }

    /// Spawns the pool using the configured maximum thread count.
    pub fn initialize(&mut self) -> Result<(), SchedulerError> {
        self.initialize_with(self.config.max_threads)
    }

    /// Spawns exactly `thread_count` workers and blocks until every one has
    /// reported ready.
    ///
    /// Fails without side effects when `thread_count` is zero, exceeds the
    /// configured maximum, or the scheduler is already initialized. If a
    /// worker thread cannot be spawned, the workers spawned before it are
    /// torn down before the error returns.
    pub fn initialize_with(&mut self, thread_count: usize) -> Result<(), SchedulerError> {
        if !self.workers.is_empty() {
            return Err(SchedulerError::AlreadyInitialized);
        }
        if thread_count == 0 || thread_count > self.config.max_threads {
            return Err(SchedulerError::InvalidThreadCount {
                requested: thread_count,
                max: self.config.max_threads,
            });
        }

        let queue = Arc::new(TaskQueue::new(self.config.task_capacity)?);
        let sync = Arc::new(PhaseSync::new(thread_count));
        let stats: Arc<[CachePadded<WorkerStats>]> = (0..thread_count)
            .map(|worker_id| CachePadded::new(WorkerStats::new(worker_id)))
            .collect();

        for worker_id in 0..thread_count {
            match Worker::spawn(worker_id, Arc::clone(&sync), Arc::clone(&stats)) {
                Ok(worker) => self.workers.push(worker),
                Err(err) => {
                    for worker in &self.workers {
                        worker.post_command(Command::Exit);
                    }
                    sync.notify_exit();
                    for worker in &mut self.workers {
                        worker.join();
                    }
                    self.workers.clear();
                    return Err(SchedulerError::Spawn(err));
                }
            }
        }

        sync.wait_ready();

        self.queue = Some(queue);
        self.sync = Some(sync);
        self.stats = Some(stats);
        Ok(())
    }

    /// Queues a task for execution in every subsequent phase.
    ///
    /// Fails with `QueueFull` when the fixed capacity is reached, leaving
    /// the queue unchanged. Controller-only, between phases.
    pub fn create_task<F>(&mut self, task: F) -> Result<(), SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Some(queue) = self.queue.as_mut() else {
            return Err(SchedulerError::NotInitialized);
        };
        let Some(queue) = Arc::get_mut(queue) else {
            // A worker still holds the queue past the completion edge; the
            // protocol makes this unreachable between phases.
            debug_assert!(false, "task queue shared outside an execute phase");
            return Err(SchedulerError::NotInitialized);
        };

        queue.add_task(task)?;
        Ok(())
    }

    /// Runs one processing phase bounded by the configured default timeout.
    pub fn execute(&mut self) -> Result<(), SchedulerError> {
        self.execute_with_timeout(self.config.default_timeout_ms)
    }

    /// Runs one processing phase: every queued task is claimed and executed
    /// exactly once across the pool.
    ///
    /// `timeout_ms` bounds the completion wait; 0 waits forever. With no
    /// tasks queued the phase is trivially successful and the workers are
    /// never woken. On timeout the scheduler shuts itself down and returns
    /// [`SchedulerError::Timeout`]; see the module docs.
    pub fn execute_with_timeout(&mut self, timeout_ms: u64) -> Result<(), SchedulerError> {
        if self.workers.is_empty() {
            return Err(SchedulerError::NotInitialized);
        }

        let phase_started = Instant::now();

        let (Some(queue_arc), Some(sync)) = (self.queue.as_mut(), self.sync.as_ref()) else {
            return Err(SchedulerError::NotInitialized);
        };

        let task_count = match Arc::get_mut(queue_arc) {
            Some(queue) => queue.begin_processing(),
            None => {
                debug_assert!(false, "task queue shared outside an execute phase");
                return Err(SchedulerError::NotInitialized);
            }
        };

        if task_count == 0 {
            self.execution_time_ms = millis_since(phase_started);
            return Ok(());
        }

        for worker in &self.workers {
            worker.post_command(Command::Execute(Arc::clone(queue_arc)));
        }

        if !sync.notify_execute(timeout_ms) {
            self.shutdown_inner(false);
            return Err(SchedulerError::Timeout { timeout_ms });
        }

        match Arc::get_mut(queue_arc) {
            Some(queue) => queue.end_processing(),
            None => {
                debug_assert!(false, "worker kept a queue reference past the completion edge")
            }
        }

        self.execution_time_ms = millis_since(phase_started);
        Ok(())
    }

    /// Tears the pool down: posts Exit to every worker, fires the exit
    /// broadcast, joins every worker thread, and clears the task queue.
    ///
    /// Idempotent: calling it on an uninitialized or already shut down
    /// scheduler does nothing. Also runs on drop.
    pub fn shutdown(&mut self) {
        self.shutdown_inner(true);
    }

    fn shutdown_inner(&mut self, join_workers: bool) {
        if self.workers.is_empty() {
            return;
        }

        for worker in &self.workers {
            worker.post_command(Command::Exit);
        }
        if let Some(sync) = self.sync.as_ref() {
            sync.notify_exit();
        }

        for worker in &mut self.workers {
            if join_workers {
                worker.join();
            } else {
                worker.detach();
            }
        }
        self.workers.clear();

        if let Some(queue) = self.queue.as_mut() {
            // After an abandoned worker the queue may still be shared; it is
            // dropped from the scheduler either way and rebuilt on the next
            // initialize.
            if let Some(queue) = Arc::get_mut(queue) {
                queue.clear();
            }
        }
        self.queue = None;
        self.sync = None;
        self.stats = None;
    }

    /// Number of worker threads currently in use; 0 when not initialized.
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Fixed task capacity of the current queue; 0 when not initialized.
    #[inline]
    pub fn maximum_tasks(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.capacity())
    }

    /// Wall-clock milliseconds the most recent successful phase took.
    #[inline]
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Per-worker counters for the most recent phase. Empty when not
    /// initialized.
    pub fn worker_stats(&self) -> StatsSnapshot {
        match self.stats.as_ref() {
            Some(stats) => StatsSnapshot::collect(stats),
            None => StatsSnapshot::default(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("thread_count", &self.workers.len())
            .field("maximum_tasks", &self.maximum_tasks())
            .field("execution_time_ms", &self.execution_time_ms)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
