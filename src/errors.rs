//! Error types for the scheduler stages.
//!
//! Errors are stage-specific to keep diagnostics precise: queue construction
//! and submission report [`QueueError`], the scheduler façade reports
//! [`SchedulerError`]. All enums are `#[non_exhaustive]` to allow adding
//! variants without breaking callers; consumers should include a fallback
//! match arm.
//!
//! # Design Notes
//! - Every recoverable failure is returned to the immediate caller; nothing
//!   is swallowed and nothing panics on these paths.
//! - I/O errors (thread spawn) preserve their source to keep diagnostics
//!   actionable.
//! - A completion timeout is fatal for the scheduler instance, and the error
//!   variant says so.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from task queue construction and submission.
#[derive(Debug)]
#[non_exhaustive]
pub enum QueueError {
    /// Queue capacity must be nonzero.
    ZeroCapacity,
    /// Submission would exceed the fixed capacity. The queue is unchanged.
    AtCapacity {
        /// The queue's fixed capacity.
        capacity: usize,
    },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ZeroCapacity => write!(f, "task queue capacity must be nonzero"),
            QueueError::AtCapacity { capacity } => {
                write!(f, "task queue is at capacity ({capacity} tasks)")
            }
        }
    }
}

impl Error for QueueError {}

/// Errors from scheduler lifecycle and phase execution.
#[derive(Debug)]
#[non_exhaustive]
pub enum SchedulerError {
    /// `initialize` was called on an initialized scheduler.
    AlreadyInitialized,
    /// The operation requires an initialized scheduler.
    NotInitialized,
    /// Requested thread count is zero or exceeds the configured maximum.
    InvalidThreadCount {
        /// The rejected request.
        requested: usize,
        /// The configured ceiling.
        max: usize,
    },
    /// The configured task capacity is zero.
    InvalidTaskCapacity,
    /// Task submission beyond the queue's fixed capacity. No task was stored.
    QueueFull {
        /// The queue's fixed capacity.
        capacity: usize,
    },
    /// A worker thread could not be spawned. Workers spawned before the
    /// failure have been torn down.
    Spawn(io::Error),
    /// A phase's completion rendezvous was not reached in time. The scheduler
    /// has torn itself down and must be re-initialized before further use.
    Timeout {
        /// The bound that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::AlreadyInitialized => write!(f, "scheduler is already initialized"),
            SchedulerError::NotInitialized => write!(f, "scheduler is not initialized"),
            SchedulerError::InvalidThreadCount { requested, max } => {
                write!(f, "thread count {requested} is outside the supported range 1..={max}")
            }
            SchedulerError::InvalidTaskCapacity => {
                write!(f, "configured task capacity must be nonzero")
            }
            SchedulerError::QueueFull { capacity } => {
                write!(f, "task queue is full ({capacity} tasks)")
            }
            SchedulerError::Spawn(err) => write!(f, "worker thread spawn failed: {err}"),
            SchedulerError::Timeout { timeout_ms } => {
                write!(f, "phase completion not observed within {timeout_ms} ms")
            }
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchedulerError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueueError> for SchedulerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::ZeroCapacity => SchedulerError::InvalidTaskCapacity,
            QueueError::AtCapacity { capacity } => SchedulerError::QueueFull { capacity },
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn queue_error_maps_into_scheduler_error() {
        let err: SchedulerError = QueueError::AtCapacity { capacity: 8 }.into();
        assert!(matches!(err, SchedulerError::QueueFull { capacity: 8 }));

        let err: SchedulerError = QueueError::ZeroCapacity.into();
        assert!(matches!(err, SchedulerError::InvalidTaskCapacity));
    }

    #[test]
    fn spawn_error_preserves_source() {
        let err = SchedulerError::Spawn(io::Error::new(io::ErrorKind::Other, "rlimit"));
        assert!(err.source().is_some());
    }

    #[test]
    fn display_is_human_readable() {
        let err = SchedulerError::Timeout { timeout_ms: 5 };
        assert_eq!(err.to_string(), "phase completion not observed within 5 ms");
    }
}
