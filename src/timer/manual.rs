//! Deterministic scheduler driven by an explicit clock.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::queue::TimerQueue;
use super::{fire, Callback, Scheduler, TaskHandle, TaskIds};

/// A scheduler whose clock only moves when [`advance`](Self::advance) is called.
///
/// Time is measured as the [`Duration`] elapsed since creation. Due callbacks
/// run on the thread calling `advance`, in deadline order, with the internal
/// lock released so they may schedule further tasks.
///
/// # Example
/// ```
/// use static_cache_server::timer::{ManualScheduler, Scheduler};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// scheduler.schedule(Duration::from_secs(10), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// scheduler.advance(Duration::from_secs(9));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_secs(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    ids: TaskIds,
}

struct ManualState {
    now: Duration,
    queue: TimerQueue<Duration>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                queue: TimerQueue::new(),
            }),
            ids: TaskIds::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current clock reading.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Move the clock forward and fire every task that became due.
    ///
    /// Returns the number of callbacks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut state = self.lock();
            state.now += by;
            state.now
        };

        let mut fired = 0;
        loop {
            let due = self.lock().queue.pop_due(target);
            match due {
                Some((handle, callback)) => {
                    fire(handle, callback);
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = self.ids.next();
        let mut state = self.lock();
        let at = state.now + delay;
        state.queue.push(at, handle, callback);
        handle
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        self.lock().queue.cancel(handle)
    }

    fn pending(&self) -> usize {
        self.lock().queue.len()
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_nothing_fires_early() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&log);
        scheduler.schedule(
            Duration::from_secs(5),
            Box::new(move || sink.lock().unwrap().push("five")),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(4_999)), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["five"]);
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (name, secs) in [("c", 3), ("a", 1), ("b", 2)] {
            let sink = Arc::clone(&log);
            scheduler.schedule(
                Duration::from_secs(secs),
                Box::new(move || sink.lock().unwrap().push(name)),
            );
        }

        assert_eq!(scheduler.advance(Duration::from_secs(10)), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_secs(10));
    }

    #[test]
    fn test_callback_may_schedule_more_work() {
        let scheduler = Arc::new(ManualScheduler::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&scheduler);
        let sink = Arc::clone(&log);
        scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                sink.lock().unwrap().push("outer");
                let sink = Arc::clone(&sink);
                inner.schedule(
                    Duration::ZERO,
                    Box::new(move || sink.lock().unwrap().push("inner")),
                );
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_secs(1)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_canceled_task_never_fires() {
        let scheduler = ManualScheduler::new();
        let handle = scheduler.schedule(Duration::from_secs(1), Box::new(|| panic!("canceled")));

        assert!(scheduler.cancel(handle));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(2)), 0);
    }
}
