//! Scheduler configuration.
//!
//! Every limit the scheduler enforces is an explicit knob here; there are no
//! hidden constants. Invalid values are rejected with an error at the call
//! that would use them (`Scheduler::initialize_with`, `TaskQueue::new`), not
//! with a panic.

/// Scheduler configuration.
///
/// Defaults describe a small desktop pool. Hosts that know their core count
/// should size `max_threads` per platform and pass the runtime count to
/// `initialize_with`:
///
/// ```no_run
/// use framesched::{Scheduler, SchedulerConfig};
///
/// let config = SchedulerConfig {
///     max_threads: 16,
///     ..SchedulerConfig::default()
/// };
/// let mut scheduler = Scheduler::new(config);
/// let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
/// scheduler.initialize_with(cores.min(config.max_threads)).unwrap();
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Hard ceiling on worker threads for this scheduler instance.
    ///
    /// `initialize_with` rejects requests above this value. The ceiling
    /// exists so a host can fix a per-platform bound once and let runtime
    /// code pick any count up to it.
    pub max_threads: usize,

    /// Fixed task queue capacity, reserved once at initialization.
    ///
    /// The queue never grows: a stable backing array is what makes the
    /// lock-free claim path safe while claims are in flight. Submissions
    /// beyond this bound fail without side effects.
    pub task_capacity: usize,

    /// Completion-wait bound in milliseconds used by `execute`; 0 waits
    /// forever.
    ///
    /// The bound exists to catch hung tasks during development. A timeout is
    /// fatal for the scheduler instance (see `SchedulerError::Timeout`), so
    /// production hosts that would rather stall than tear down should set 0.
    pub default_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_threads: 4,
            task_capacity: 256,
            default_timeout_ms: 1000,
        }
    }
}
