use crate::runtime::task::TaskRef;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A per-worker run queue.
///
/// The owning worker pushes and pops at the back (LIFO), which keeps a
/// freshly spawned child close to its parent. Peers steal from the front.
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<TaskRef>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, VecDeque<TaskRef>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, task: TaskRef) {
        self.inner().push_back(task);
    }

    /// Pops the most recently pushed task. Owner only.
    pub(crate) fn pop(&self) -> Option<TaskRef> {
        self.inner().pop_back()
    }

    /// Steals the oldest task. Used by other workers.
    pub(crate) fn steal(&self) -> Option<TaskRef> {
        self.inner().pop_front()
    }
}
