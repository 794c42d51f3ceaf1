//! Scheduler that parks each timer in its own tokio task.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::{fire, Callback, Scheduler, TaskHandle, TaskIds};

type TaskTable = Arc<Mutex<HashMap<TaskHandle, AbortHandle>>>;

/// Spawns one sleeping task per timer on a tokio runtime.
///
/// Canceling aborts the task. Callbacks run on a runtime worker, so they
/// must not block for long.
pub struct RuntimeScheduler {
    runtime: Handle,
    tasks: TaskTable,
    ids: TaskIds,
}

impl RuntimeScheduler {
    /// Schedule onto the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            ids: TaskIds::default(),
        }
    }

    /// Schedule onto the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    fn lock_tasks(tasks: &TaskTable) -> MutexGuard<'_, HashMap<TaskHandle, AbortHandle>> {
        tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for RuntimeScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = self.ids.next();
        let tasks = Arc::clone(&self.tasks);

        // The table stays locked until the abort handle is registered, so a
        // zero-delay task cannot look itself up before it exists.
        let mut table = Self::lock_tasks(&self.tasks);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = Self::lock_tasks(&tasks).remove(&handle).is_some();
            if live {
                fire(handle, callback);
            }
        });
        table.insert(handle, task.abort_handle());
        handle
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        match Self::lock_tasks(&self.tasks).remove(&handle) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        Self::lock_tasks(&self.tasks).len()
    }
}

impl Drop for RuntimeScheduler {
    fn drop(&mut self) {
        for (_, task) in Self::lock_tasks(&self.tasks).drain() {
            task.abort();
        }
    }
}

impl fmt::Debug for RuntimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
