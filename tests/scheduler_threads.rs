//! End-to-end scheduler scenarios across real worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framesched::{Scheduler, SchedulerConfig, SchedulerError};

fn counting_task(counter: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Four workers share 120 tasks; every task runs exactly once per phase.
#[test]
fn four_workers_share_a_large_batch() {
    const TASKS: usize = 120;

    let counter = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(SchedulerConfig {
        max_threads: 4,
        ..SchedulerConfig::default()
    });
    scheduler.initialize_with(4).unwrap();

    for _ in 0..TASKS {
        let counter = Arc::clone(&counter);
        scheduler
            .create_task(move || {
                // Enough work that claims spread across the pool.
                std::thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }

    scheduler.execute_with_timeout(0).unwrap();

    assert_eq!(counter.load(Ordering::Relaxed), TASKS);

    // The claim partition accounts for every task. Individual workers are
    // very likely to have participated, but that is probabilistic and not
    // asserted per worker.
    let snapshot = scheduler.worker_stats();
    assert_eq!(snapshot.workers.len(), 4);
    assert_eq!(snapshot.total_tasks, TASKS as u64);
    assert_eq!(snapshot.total_panicked, 0);
}

/// The queued batch persists across phases; each execute claims the full
/// set again from a reset cursor.
#[test]
fn repeated_phases_rerun_the_batch() {
    const TASKS: usize = 24;
    const PHASES: usize = 5;

    let counter = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.initialize_with(3).unwrap();
    for _ in 0..TASKS {
        scheduler.create_task(counting_task(&counter)).unwrap();
    }

    for _ in 0..PHASES {
        scheduler.execute().unwrap();
    }

    assert_eq!(counter.load(Ordering::Relaxed), TASKS * PHASES);
}

/// A timed-out phase tears the pool down; the instance is reusable after
/// re-initialization.
#[test]
fn pool_recovers_by_reinitializing_after_timeout() {
    let counter = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.initialize_with(2).unwrap();
    scheduler
        .create_task(|| std::thread::sleep(Duration::from_millis(300)))
        .unwrap();

    assert!(matches!(
        scheduler.execute_with_timeout(5),
        Err(SchedulerError::Timeout { .. })
    ));
    assert_eq!(scheduler.thread_count(), 0);

    scheduler.initialize_with(2).unwrap();
    scheduler.create_task(counting_task(&counter)).unwrap();
    scheduler.execute().unwrap();
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}

/// A panicking task is contained: the phase completes, the panic shows up
/// in the stats, and later phases still run.
#[test]
fn panicking_task_is_contained_and_reported() {
    let counter = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    scheduler.initialize_with(2).unwrap();

    scheduler.create_task(|| panic!("task bug")).unwrap();
    for _ in 0..8 {
        scheduler.create_task(counting_task(&counter)).unwrap();
    }

    scheduler.execute().unwrap();
    assert_eq!(counter.load(Ordering::Relaxed), 8);

    let snapshot = scheduler.worker_stats();
    assert_eq!(snapshot.total_tasks, 9);
    assert_eq!(snapshot.total_panicked, 1);

    scheduler.execute().unwrap();
    assert_eq!(counter.load(Ordering::Relaxed), 16);
}

/// Dropping an initialized scheduler tears the pool down cleanly.
#[test]
fn drop_shuts_the_pool_down() {
    let counter = Arc::new(AtomicUsize::new(0));

    {
        let mut scheduler = Scheduler::default();
        scheduler.initialize().unwrap();
        scheduler.create_task(counting_task(&counter)).unwrap();
        scheduler.execute().unwrap();
    }

    assert_eq!(counter.load(Ordering::Relaxed), 1);
}
