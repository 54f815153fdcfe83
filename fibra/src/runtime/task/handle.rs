use crate::runtime::task::{Runnable, Task};
use crate::runtime::task::id::TaskId;
use crate::runtime::task::state::TaskState;

use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::sync::{Arc, PoisonError};
use std::task::{Context, Poll};

/// A handle to a spawned task.
///
/// A `JoinHandle` is a future that resolves to the task's output once the
/// task has completed.
///
/// Dropping the `JoinHandle` does **not** cancel the task; it only
/// discards the ability to observe its result.
pub struct JoinHandle<T> {
    pub(crate) task: Arc<Task<T>>,
}

impl<T: Send + 'static> JoinHandle<T> {
    /// Returns the identifier of the spawned task.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Returns `true` once the task has produced its output.
    pub fn is_finished(&self) -> bool {
        self.task.state.load() == TaskState::Completed
    }

    fn poll_output(&self) -> Option<Poll<T>> {
        if !self.is_finished() {
            return None;
        }

        // SAFETY: `Completed` is published after the worker wrote the result
        // and the worker never touches it again.
        let result = unsafe { (*self.task.result.get()).take() };

        match result.expect("JoinHandle polled after completion") {
            Ok(value) => Some(Poll::Ready(value)),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<T: Send + 'static> Future for JoinHandle<T> {
    type Output = T;

    /// Resolves with the task output.
    ///
    /// Only the waker of the latest poll is kept. It is registered before
    /// the state is checked a second time, so a completion racing with
    /// registration is not missed.
    ///
    /// # Panics
    ///
    /// Resumes the task's panic if the task panicked. Panics if polled
    /// again after it returned `Poll::Ready`.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if let Some(ready) = self.poll_output() {
            return ready;
        }

        {
            let mut slot = self
                .task
                .join_waker
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_mut() {
                Some(waker) if waker.will_wake(cx.waker()) => {}
                _ => *slot = Some(cx.waker().clone()),
            }
        }

        self.poll_output().unwrap_or(Poll::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::scheduler::injector::Injector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Wake, Waker};

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter(AtomicUsize::new(0)))
    }

    fn handle<T, F>(future: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        JoinHandle {
            task: Arc::new(Task::new(future, Arc::new(Injector::new()))),
        }
    }

    #[test]
    fn repeated_polls_keep_only_the_latest_waker() {
        let mut handle = handle(async { 7 });
        let (old, new) = (counter(), counter());

        let waker = Waker::from(old.clone());
        for _ in 0..1_000 {
            let poll = Pin::new(&mut handle).poll(&mut Context::from_waker(&waker));
            assert!(poll.is_pending());
        }
        let waker = Waker::from(new.clone());
        assert!(Pin::new(&mut handle).poll(&mut Context::from_waker(&waker)).is_pending());

        handle.task.clone().run();

        assert_eq!(old.0.load(Ordering::SeqCst), 0);
        assert_eq!(new.0.load(Ordering::SeqCst), 1);
        assert_eq!(
            Pin::new(&mut handle).poll(&mut Context::from_waker(Waker::noop())),
            Poll::Ready(7)
        );
    }

    #[test]
    #[should_panic(expected = "task blew up")]
    fn panicked_task_resumes_in_the_awaiter() {
        let mut handle = handle(async { panic!("task blew up") });

        handle.task.clone().run();
        assert!(handle.is_finished());

        let _ = Pin::new(&mut handle).poll(&mut Context::from_waker(Waker::noop()));
    }
}
