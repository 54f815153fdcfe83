use super::JoinHandle;
use super::id::TaskId;
use super::state::{AtomicState, TaskState};
use crate::runtime::context::{CURRENT_INJECTOR, CURRENT_LOCALS, CURRENT_TASK, CURRENT_WORKER_ID};
use crate::runtime::scheduler::injector::Injector;
use crate::runtime::task::waker::make_waker;

use std::cell::UnsafeCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::thread;

/// A runnable unit of work that can be executed by the scheduler.
///
/// The trait erases the task's output type so the executor and the mutex
/// wait queue can hold heterogeneous tasks as `Arc<dyn Runnable>`.
pub(crate) trait Runnable: Send + Sync {
    /// Polls the task once. Called by a worker thread.
    fn run(self: Arc<Self>);

    /// Identifier assigned at spawn time.
    fn id(&self) -> TaskId;

    /// Current scheduling state, for diagnostics.
    fn state(&self) -> TaskState;
}

/// Shared, type-erased reference to a task.
pub(crate) type TaskRef = Arc<dyn Runnable>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A spawned asynchronous task managed by the runtime.
pub(crate) struct Task<T> {
    id: TaskId,

    /// The future, dropped as soon as it completes.
    ///
    /// Only accessed by the worker that moved the state to `Running`.
    future: UnsafeCell<Option<BoxFuture<T>>>,

    /// Output of the future, or the panic payload if it panicked. Taken
    /// by the join handle.
    pub(crate) result: UnsafeCell<Option<thread::Result<T>>>,

    pub(crate) state: AtomicState,

    /// Global injector used to reschedule the task when woken.
    injector: Arc<Injector>,

    /// Waker of the `JoinHandle` awaiting this task.
    pub(crate) join_waker: Mutex<Option<Waker>>,
}

// SAFETY: the `UnsafeCell`s are only touched by the worker holding the
// `Running` state (future, result write) or after `Completed` is published
// (result read).
unsafe impl<T> Send for Task<T> {}
unsafe impl<T> Sync for Task<T> {}

impl<T: Send + 'static> Task<T> {
    /// Creates a task in the `Queued` state.
    pub(crate) fn new<F>(future: F, injector: Arc<Injector>) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            id: TaskId::next(),
            future: UnsafeCell::new(Some(Box::pin(future))),
            result: UnsafeCell::new(None),
            state: AtomicState::new(TaskState::Queued),
            injector,
            join_waker: Mutex::new(None),
        }
    }

    /// Polls the task once.
    ///
    /// While the future is polled, the task is installed as the current
    /// task of this thread so that [`current_id`](super::current_id) and
    /// the mutex wait queue can identify it.
    pub(crate) fn run(self: Arc<Self>) {
        let current = self.state.load();

        if current != TaskState::Queued && current != TaskState::Notified {
            return;
        }

        // Transition to RUNNING. This ensures exclusive access to the future.
        if !self.state.transition(current, TaskState::Running) {
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        let this: TaskRef = self.clone();
        let previous = CURRENT_TASK.with(|cell| cell.replace(Some(this)));

        // SAFETY: the `Running` state guarantees no other thread polls this future.
        let slot = unsafe { &mut *self.future.get() };

        // A panicking task completes with the payload; the worker survives.
        let poll = match slot.as_mut() {
            Some(future) => {
                match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
                    Ok(Poll::Ready(val)) => Poll::Ready(Ok(val)),
                    Ok(Poll::Pending) => Poll::Pending,
                    Err(payload) => {
                        log::error!("{} panicked", self.id);
                        Poll::Ready(Err(payload))
                    }
                }
            }
            None => Poll::Pending,
        };

        CURRENT_TASK.with(|cell| cell.replace(previous));

        match poll {
            Poll::Pending => {
                if !self.state.transition(TaskState::Running, TaskState::Idle) {
                    // Woken during the poll: run it again.
                    self.state.store(TaskState::Queued);
                    self.injector.push(self.clone());
                }
            }
            Poll::Ready(result) => {
                // Dropping the future releases whatever it held, including
                // mutex guards of a panicked task.
                *slot = None;

                // SAFETY: still `Running`; the join handle reads only after `Completed`.
                unsafe {
                    *self.result.get() = Some(result);
                }
                self.state.store(TaskState::Completed);

                let waker = self
                    .join_waker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        }
    }

    /// Signals the task to be rescheduled.
    ///
    /// An `Idle` task is queued. A `Running` task becomes `Notified` so it
    /// is re-polled right after its current poll.
    pub(crate) fn schedule(self: Arc<Self>) {
        loop {
            match self.state.load() {
                TaskState::Idle => {
                    if self.state.transition(TaskState::Idle, TaskState::Queued) {
                        self.injector.push(self.clone());
                        return;
                    }
                }
                TaskState::Running => {
                    if self.state.transition(TaskState::Running, TaskState::Notified) {
                        return;
                    }
                }
                TaskState::Queued | TaskState::Notified | TaskState::Completed => return,
            }
        }
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        Task::run(self)
    }

    fn id(&self) -> TaskId {
        self.id
    }

    fn state(&self) -> TaskState {
        self.state.load()
    }
}

/// Spawns a future as a task onto the current runtime.
///
/// The task goes to the calling worker's local queue when called from a
/// task, and to the global injector otherwise.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn spawn<F, T>(future: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let injector = CURRENT_INJECTOR.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("spawn must be called within the context of a runtime")
            .clone()
    });

    let task = Arc::new(Task::new(future, injector.clone()));
    log::trace!("spawned {}", task.id);

    let pushed_locally = CURRENT_WORKER_ID.with(|id_cell| {
        let Some(id) = *id_cell.borrow() else {
            return false;
        };

        CURRENT_LOCALS.with(|locals_cell| match locals_cell.borrow().as_ref() {
            Some(locals) => {
                locals[id].push(task.clone());
                true
            }
            None => false,
        })
    });

    if !pushed_locally {
        injector.push(task.clone());
    }

    JoinHandle { task }
}
