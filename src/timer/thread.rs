//! Scheduler backed by a single dedicated timer thread.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::queue::TimerQueue;
use super::{fire, Callback, Scheduler, TaskHandle, TaskIds};

/// Runs timers on one background thread.
///
/// The thread sleeps on a condition variable until the earliest deadline (or
/// until a new, earlier task is scheduled). Callbacks run on that thread with
/// no scheduler lock held, one after another, so they should be short.
///
/// Dropping the scheduler stops the thread; tasks still pending are discarded.
///
/// # Example
/// ```
/// use static_cache_server::timer::{Scheduler, ThreadScheduler};
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// let scheduler = ThreadScheduler::new();
/// let (tx, rx) = mpsc::channel();
/// scheduler.schedule(Duration::from_millis(5), Box::new(move || tx.send(()).unwrap()));
/// rx.recv_timeout(Duration::from_secs(1)).unwrap();
/// ```
pub struct ThreadScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    ids: TaskIds,
}

struct State {
    queue: TimerQueue<Instant>,
    shutdown: bool,
}

impl ThreadScheduler {
    /// Spawn the timer thread.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: TimerQueue::new(),
                shutdown: false,
            }),
            wake: Condvar::new(),
            ids: TaskIds::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("cache-timer".to_string())
            .spawn(move || worker_shared.run())
            .map_err(|err| tracing::error!(%err, "failed to spawn timer thread"))
            .ok();

        Self { shared, worker }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self) {
        debug!("timer thread started");
        let mut state = self.lock();
        loop {
            if state.shutdown {
                break;
            }

            let now = Instant::now();
            if let Some((handle, callback)) = state.queue.pop_due(now) {
                drop(state);
                trace!(task = %handle, "firing timer");
                fire(handle, callback);
                state = self.lock();
                continue;
            }

            state = match state.queue.next_deadline() {
                Some(at) => {
                    let timeout = at.saturating_duration_since(now);
                    self.wake
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self.wake.wait(state).unwrap_or_else(PoisonError::into_inner),
            };
        }
        state.queue.clear();
        debug!("timer thread stopped");
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = self.shared.ids.next();
        let at = Instant::now() + delay;
        let mut state = self.shared.lock();
        state.queue.push(at, handle, callback);
        drop(state);
        self.shared.wake.notify_one();
        handle
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        self.shared.lock().queue.cancel(handle)
    }

    fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_one();

        if let Some(worker) = self.worker.take() {
            // A callback can drop the last owner of this scheduler; the timer
            // thread cannot join itself, so it just exits on its next loop.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl fmt::Debug for ThreadScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
