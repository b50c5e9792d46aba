//! Fixed-capacity, frame-oriented task scheduler over a fixed worker pool.
//!
//! ## Scope
//! This crate runs batches of independent, parameterless tasks on a fixed
//! pool of long-lived worker threads, one batch per *phase* (frame). The
//! pool synchronizes through barrier-style rendezvous points instead of a
//! locked work queue: workers park between phases, a broadcast releases
//! them, and each drains the shared task sequence through a lock-free claim
//! cursor.
//!
//! ## Key invariants
//! - The pool size and the task capacity are fixed at initialization; no
//!   resizing, no queue growth, no reallocation while claims are in flight.
//! - Within a phase every task is claimed by exactly one worker exactly
//!   once; only the claim cursor is shared-mutable, behind a CAS-held
//!   micro-critical-section rather than a blocking lock.
//! - The controller observes a phase's completion rendezvous before it may
//!   touch the queue or post the next phase: a full synchronization edge.
//! - A completion timeout is fatal for the scheduler instance: it tears the
//!   pool down rather than keep dispatching past a hung task.
//!
//! ## Phase flow
//! `create_task* -> execute: begin_processing -> post Execute to all workers
//! -> broadcast -> workers claim/run until exhausted -> completion
//! rendezvous -> end_processing`
//!
//! ## Notable entry points
//! - [`Scheduler`] / [`SchedulerConfig`]: the host-facing façade.
//! - [`TaskQueue`]: fixed-capacity sequence with the lock-free claim path.
//! - [`PhaseSync`]: the three-rendezvous barrier primitive.
//! - [`StatsSnapshot`]: per-worker counters after a phase.
//!
//! ## Design trade-offs
//! Barrier rendezvous trades per-item dispatch flexibility for zero
//! per-task queue locking and a worker loop that sleeps whenever no phase
//! is running. The claim guard is a deliberate spin: the guarded region is
//! an index read and increment, far cheaper than parking on contention.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod queue;
pub mod scheduler;
pub mod sync;

mod worker;

pub use config::SchedulerConfig;
pub use errors::{QueueError, SchedulerError};
pub use metrics::{StatsSnapshot, WorkerPhase, WorkerStats};
pub use queue::{Task, TaskQueue};
pub use scheduler::Scheduler;
pub use sync::PhaseSync;
