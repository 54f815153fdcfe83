use crate::runtime::task::TaskRef;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared handle to the global task injector.
pub(crate) type InjectorHandle = Arc<Injector>;

/// How long an idle worker sleeps before it looks for work again.
///
/// Local queues are not signalled, so parked workers rely on this bound
/// to pick up stealable work.
const PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// Global task queue and parking lot for idle workers.
pub(crate) struct Injector {
    queue: Mutex<VecDeque<TaskRef>>,

    /// Signalled when a task is pushed or shutdown starts.
    condvar: Condvar,

    shutdown: AtomicBool,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Injector {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<TaskRef>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals shutdown and wakes all parked workers.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a task and wakes one parked worker.
    pub(crate) fn push(&self, task: TaskRef) {
        self.queue().push_back(task);
        self.condvar.notify_one();
    }

    /// Parks the calling worker until a task is pushed, shutdown starts,
    /// or [`PARK_TIMEOUT`] elapses.
    pub(crate) fn park(&self) {
        let queue = self.queue();

        if self.is_shutdown() || !queue.is_empty() {
            return;
        }

        let _ = self
            .condvar
            .wait_timeout(queue, PARK_TIMEOUT)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Takes the oldest task, if any.
    pub(crate) fn steal(&self) -> Option<TaskRef> {
        self.queue().pop_front()
    }
}
