//! Deadline-ordered task table shared by the thread and manual schedulers.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::{Callback, TaskHandle};

/// Min-heap of deadlines plus the callbacks that are still live.
///
/// Canceling only drops the callback; its heap slot stays behind as a
/// tombstone and is skipped when it reaches the front.
pub(crate) struct TimerQueue<T: Ord + Copy> {
    deadlines: BinaryHeap<Reverse<(T, TaskHandle)>>,
    callbacks: HashMap<TaskHandle, Callback>,
}

impl<T: Ord + Copy> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            deadlines: BinaryHeap::new(),
            callbacks: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, at: T, handle: TaskHandle, callback: Callback) {
        self.deadlines.push(Reverse((at, handle)));
        self.callbacks.insert(handle, callback);
    }

    pub(crate) fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.callbacks.remove(&handle).is_some()
    }

    /// Earliest deadline among live tasks, discarding tombstones on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<T> {
        while let Some(Reverse((at, handle))) = self.deadlines.peek() {
            if self.callbacks.contains_key(handle) {
                return Some(*at);
            }
            self.deadlines.pop();
        }
        None
    }

    /// Take the earliest live task if its deadline is at or before `now`.
    pub(crate) fn pop_due(&mut self, now: T) -> Option<(TaskHandle, Callback)> {
        match self.next_deadline() {
            Some(at) if at <= now => {
                let Reverse((_, handle)) = self.deadlines.pop()?;
                let callback = self.callbacks.remove(&handle)?;
                Some((handle, callback))
            }
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.deadlines.clear();
        self.callbacks.clear();
    }
}
