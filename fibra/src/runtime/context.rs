use crate::runtime::scheduler::injector::InjectorHandle;
use crate::runtime::scheduler::local::LocalQueue;
use crate::runtime::task::TaskRef;
use crate::timer::TimerHandle;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// Handle to the timer driver of the runtime this thread belongs to.
    pub(crate) static CURRENT_TIMER: RefCell<Option<TimerHandle>> =
        const { RefCell::new(None) };

    /// Handle to the global injector queue.
    pub(crate) static CURRENT_INJECTOR: RefCell<Option<InjectorHandle>> =
        const { RefCell::new(None) };

    /// Index of the worker running on this thread.
    pub(crate) static CURRENT_WORKER_ID: RefCell<Option<usize>> =
        const { RefCell::new(None) };

    /// Local queues of all workers, indexed by worker id.
    pub(crate) static CURRENT_LOCALS: RefCell<Option<Arc<Vec<Arc<LocalQueue>>>>> =
        const { RefCell::new(None) };

    /// Task being polled on this thread, installed by `Task::run`.
    pub(crate) static CURRENT_TASK: RefCell<Option<TaskRef>> =
        const { RefCell::new(None) };
}

/// Installs the runtime handles for the duration of `f`.
///
/// The previous handles are restored afterwards, so contexts nest.
pub(crate) fn enter_context<R>(
    timer: TimerHandle,
    injector: InjectorHandle,
    f: impl FnOnce() -> R,
) -> R {
    let prev_t = CURRENT_TIMER.with(|t| t.replace(Some(timer)));
    let prev_i = CURRENT_INJECTOR.with(|i| i.replace(Some(injector)));

    let out = f();

    CURRENT_INJECTOR.with(|i| i.replace(prev_i));
    CURRENT_TIMER.with(|t| t.replace(prev_t));

    out
}
