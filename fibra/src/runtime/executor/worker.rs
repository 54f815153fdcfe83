use crate::runtime::context::{CURRENT_LOCALS, CURRENT_WORKER_ID};
use crate::runtime::scheduler::injector::InjectorHandle;
use crate::runtime::scheduler::local::LocalQueue;
use crate::runtime::task::TaskRef;

use std::sync::Arc;

/// A worker thread of the executor.
///
/// Tasks are taken, in order, from:
/// 1. the worker's own local queue,
/// 2. the global injector,
/// 3. another worker's local queue.
///
/// With nothing to do, the worker parks on the injector.
pub(crate) struct Worker {
    id: usize,

    /// All local queues (one per worker).
    locals: Arc<Vec<Arc<LocalQueue>>>,

    injector: InjectorHandle,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        locals: Arc<Vec<Arc<LocalQueue>>>,
        injector: InjectorHandle,
    ) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    /// Runs tasks until the injector is shut down.
    ///
    /// Must be called inside the runtime context (see
    /// [`enter_context`](crate::runtime::context::enter_context)).
    pub(crate) fn run(&self) {
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = Some(self.id));
        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = Some(self.locals.clone()));

        log::debug!("worker {} started", self.id);

        while !self.injector.is_shutdown() {
            match self.next_task() {
                Some(task) => task.run(),
                None => self.injector.park(),
            }
        }

        CURRENT_LOCALS.with(|locals| locals.borrow_mut().take());
        CURRENT_WORKER_ID.with(|id| id.borrow_mut().take());

        log::debug!("worker {} stopped", self.id);
    }

    fn next_task(&self) -> Option<TaskRef> {
        self.locals[self.id]
            .pop()
            .or_else(|| self.injector.steal())
            .or_else(|| self.try_steal())
    }

    /// Steals from peers, visiting them round-robin starting after this
    /// worker.
    fn try_steal(&self) -> Option<TaskRef> {
        let len = self.locals.len();

        (1..len)
            .map(|offset| (self.id + offset) % len)
            .find_map(|victim| self.locals[victim].steal())
    }
}
