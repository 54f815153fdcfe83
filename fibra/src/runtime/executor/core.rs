use crate::runtime::context::enter_context;
use crate::runtime::executor::worker::Worker;
use crate::runtime::scheduler::injector::Injector;
use crate::runtime::scheduler::local::LocalQueue;
use crate::runtime::task::Task;
use crate::timer::TimerHandle;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Multi-threaded task executor.
///
/// Owns the global injector and the worker threads.
pub(crate) struct Executor {
    injector: Arc<Injector>,

    handles: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Spawns `threads` workers named `{name}-worker-{id}`.
    ///
    /// Each worker runs inside the runtime context, so tasks can spawn,
    /// sleep, and park on mutexes.
    pub(crate) fn new(timer: TimerHandle, threads: usize, name: &str) -> io::Result<Self> {
        let injector = Arc::new(Injector::new());

        let locals: Arc<Vec<Arc<LocalQueue>>> =
            Arc::new((0..threads).map(|_| Arc::new(LocalQueue::new())).collect());

        let mut handles = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker = Worker::new(id, locals.clone(), injector.clone());
            let timer = timer.clone();
            let context_injector = injector.clone();

            let handle = thread::Builder::new()
                .name(format!("{name}-worker-{id}"))
                .spawn(move || enter_context(timer, context_injector, || worker.run()));

            match handle {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    let mut partial = Self { injector, handles };
                    partial.shutdown();
                    partial.join();
                    return Err(err);
                }
            }
        }

        Ok(Self { injector, handles })
    }

    /// Signals all workers to stop after their current task.
    pub(crate) fn shutdown(&self) {
        self.injector.shutdown();
    }

    /// Submits a root task. Ignored once shutdown has begun.
    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.injector.is_shutdown() {
            return;
        }

        let task = Arc::new(Task::new(future, self.injector.clone()));
        self.injector.push(task);
    }

    /// Waits for all worker threads to terminate.
    pub(crate) fn join(&mut self) {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}
