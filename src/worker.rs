//! Command-driven worker unit: one long-lived OS thread per unit.
//!
//! # Lifecycle
//!
//! ```text
//! Spawned ──notify_ready──► AwaitingCommand ──Execute──► Executing
//!                                 ▲                          │
//!                                 └───notify_complete────────┘
//!                                 │
//!                               Exit ──► stats reset, thread returns
//! ```
//!
//! A worker consumes at most one command per wakeup, exactly once, via
//! [`CommandSlot::take`]. The barrier's rendezvous protocol guarantees the
//! previous command was consumed before the controller posts the next one
//! (timeout teardown is the documented exception; see the scheduler).
//!
//! # Panic containment
//!
//! A task callable that panics is caught at the claim loop so the worker
//! still drains the queue and reaches the completion rendezvous; the panic
//! is surfaced through the worker's stats instead of wedging the phase.
//! A task that never *returns* is outside the worker's reach; that is the
//! scheduler's completion timeout.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_utils::CachePadded;

use crate::metrics::{millis_since, WorkerStats};
use crate::queue::TaskQueue;
use crate::sync::PhaseSync;

/// One operation posted by the controller for a worker to perform.
pub(crate) enum Command {
    /// Drain the queue via lock-free claims, then report completion. The
    /// carried reference is phase-scoped: the worker drops it before its
    /// completion report, so the completion edge proves the controller is
    /// the queue's sole owner again.
    Execute(Arc<TaskQueue>),
    /// Leave the command loop; the thread returns and can be joined.
    Exit,
}

/// Single-occupancy command mailbox between the controller and one worker.
///
/// Not a queue: at most one command is pending at a time, and each command
/// is consumed exactly once. The mutex is uncontended by protocol: the
/// controller posts only between phases, the worker takes only on wakeup.
pub(crate) struct CommandSlot {
    pending: Mutex<Option<Command>>,
}

impl CommandSlot {
    fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Controller-side: posts the next command.
    ///
    /// Between phases the rendezvous protocol guarantees the slot is empty.
    /// The one exception is timeout teardown, where Exit may land before a
    /// slow worker consumed its Execute; the replacement is intended there,
    /// since the phase is already abandoned.
    fn post(&self, command: Command) {
        let mut pending = self.pending.lock().expect("command slot poisoned");
        debug_assert!(
            pending.is_none() || matches!(command, Command::Exit),
            "command posted before the previous one was consumed"
        );
        *pending = Some(command);
    }

    /// Worker-side: consumes the pending command, if any.
    fn take(&self) -> Option<Command> {
        self.pending.lock().expect("command slot poisoned").take()
    }
}

/// One worker unit: a named OS thread plus its command mailbox.
pub(crate) struct Worker {
    slot: Arc<CommandSlot>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the worker thread. The worker reports ready and parks in its
    /// command loop; `worker_id` indexes its stats slot and is stable for
    /// the worker's lifetime.
    pub(crate) fn spawn(
        worker_id: usize,
        sync: Arc<PhaseSync>,
        stats: Arc<[CachePadded<WorkerStats>]>,
    ) -> io::Result<Worker> {
        let slot = Arc::new(CommandSlot::new());
        let thread_slot = Arc::clone(&slot);

        let handle = thread::Builder::new()
            .name(format!("framesched-worker-{worker_id}"))
            .spawn(move || worker_loop(worker_id, &sync, &thread_slot, &stats))?;

        Ok(Worker {
            slot,
            handle: Some(handle),
        })
    }

    /// Posts a command. Controller-only, and only between phases.
    pub(crate) fn post_command(&self, command: Command) {
        self.slot.post(command);
    }

    /// Blocks until the worker thread has fully terminated. Only meaningful
    /// after Exit has been posted and the exit broadcast fired.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Abandons the thread instead of joining it. Used on the timeout
    /// teardown path, where a worker may be stuck inside a task that never
    /// returns and a join would inherit the hang.
    pub(crate) fn detach(&mut self) {
        self.handle = None;
    }
}

fn worker_loop(
    worker_id: usize,
    sync: &PhaseSync,
    slot: &CommandSlot,
    stats: &[CachePadded<WorkerStats>],
) {
    let stats = &stats[worker_id];
    sync.notify_ready();

    let mut epoch = PhaseSync::INITIAL_EPOCH;
    loop {
        epoch = sync.wait_execute(epoch);

        match slot.take() {
            Some(Command::Execute(queue)) => {
                run_phase(&queue, stats);
                // End of the phase-scoped queue reference: drop before the
                // completion report so the controller regains sole ownership.
                drop(queue);
                sync.notify_complete();
            }
            Some(Command::Exit) => break,
            // Protocol posts a command before every wakeup; an empty slot
            // here should not occur. Park again rather than guess.
            None => continue,
        }
    }

    stats.reset();
}

/// Drains the queue: claim, run, record, until exhaustion.
fn run_phase(queue: &TaskQueue, stats: &WorkerStats) {
    let phase_started = Instant::now();
    stats.begin_phase();

    while let Some(task) = queue.claim_next() {
        let task_started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.invoke()));
        task.record_duration_ms(millis_since(task_started));

        if outcome.is_err() {
            stats.record_panicked_task();
        }
        stats.record_task();
    }

    stats.record_phase_millis(millis_since(phase_started));
}
