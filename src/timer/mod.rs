//! One-shot deferred callbacks.
//!
//! A [`Scheduler`] runs each callback exactly once, no earlier than the delay
//! it was scheduled with, on a thread or task that belongs to the scheduler.
//! The cache never assumes a particular implementation; it receives one as an
//! `Arc<dyn Scheduler>` so tests can swap in a [`ManualScheduler`].
//!
//! | Scheduler            | Fires on                          |
//! |----------------------|-----------------------------------|
//! | [`ThreadScheduler`]  | a dedicated timer thread          |
//! | [`RuntimeScheduler`] | one tokio task per timer          |
//! | [`ManualScheduler`]  | the thread calling `advance`      |

mod manual;
mod queue;
mod runtime;
mod thread;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use manual::ManualScheduler;
pub use runtime::RuntimeScheduler;
pub use thread::ThreadScheduler;

/// Work executed when a timer fires.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled task so it can be canceled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// The numeric id of this task, unique per scheduler.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// A facility that runs callbacks after a delay.
///
/// Implementations must never block the caller of [`schedule`](Scheduler::schedule)
/// and must never run a callback on the caller's thread from inside `schedule`.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Register `callback` to run once, at least `delay` from now.
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle;

    /// Cancel a task that has not fired yet.
    ///
    /// Returns `true` if the task was pending and will now never fire.
    fn cancel(&self, handle: TaskHandle) -> bool;

    /// Number of tasks scheduled but not yet fired or canceled.
    fn pending(&self) -> usize;
}

/// Monotonic task id source shared by the scheduler implementations.
#[derive(Debug, Default)]
pub(crate) struct TaskIds(AtomicU64);

impl TaskIds {
    pub(crate) fn next(&self) -> TaskHandle {
        TaskHandle(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Run a callback, keeping a panic inside it from taking down the firing thread.
pub(crate) fn fire(handle: TaskHandle, callback: Callback) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback));
    if outcome.is_err() {
        tracing::error!(task = %handle, "timer callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique() {
        let ids = TaskIds::default();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_fire_swallows_panics() {
        let ids = TaskIds::default();
        fire(ids.next(), Box::new(|| panic!("boom")));
    }

    #[test]
    fn test_handle_display() {
        let ids = TaskIds::default();
        assert_eq!(ids.next().to_string(), "timer#0");
    }
}
