use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::runtime::context::CURRENT_TASK;

/// Unique identifier of a spawned task.
///
/// Identifiers are allocated from a process-wide counter and are never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Returns the identifier of the task currently being polled on this
/// thread.
///
/// Returns `None` outside a task, for example on the thread that called
/// [`Runtime::block_on`](crate::Runtime::block_on) or inside a future
/// driven by another executor.
pub fn current_id() -> Option<TaskId> {
    CURRENT_TASK.with(|cell| cell.borrow().as_ref().map(|task| task.id()))
}
