use super::executor::core::Executor;
use crate::timer::command::Command;
use crate::timer::{TimerDriver, TimerHandle};

use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

/// The main runtime handle.
///
/// `Runtime` is responsible for:
/// - spawning asynchronous tasks,
/// - driving task execution via the executor,
/// - running the timer driver used by sleeps and timed lock attempts,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// A task that panics completes with its panic payload, which resumes in
/// whoever awaits its [`JoinHandle`](crate::task::JoinHandle). The worker
/// thread that polled it keeps running.
///
/// Dropping the runtime shuts down all internal components in an orderly
/// fashion.
pub struct Runtime {
    executor: Executor,

    timer: TimerHandle,

    timer_thread: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Starts the timer driver, then `worker_threads` workers.
    pub(crate) fn new(worker_threads: usize, thread_name: &str) -> io::Result<Self> {
        let (timer, timer_thread) = TimerDriver::start(thread_name)?;

        let executor = match Executor::new(timer.clone(), worker_threads, thread_name) {
            Ok(executor) => executor,
            Err(err) => {
                let _ = timer.send(Command::Shutdown);
                let _ = timer_thread.join();
                return Err(err);
            }
        };

        log::debug!("runtime started with {worker_threads} workers");

        Ok(Self {
            executor,
            timer,
            timer_thread: Some(timer_thread),
        })
    }

    /// Spawns a future onto the runtime.
    ///
    /// The future is executed asynchronously and runs until completion.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// runtime.spawn(async {
    ///     // background task
    /// });
    /// ```
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.executor.spawn(future);
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// The future is spawned onto the executor as a task, so it may lock
    /// mutexes and sleep like any other task. Its result is sent back
    /// through a channel.
    ///
    /// # Panics
    ///
    /// Resumes the future's panic on the calling thread.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async {
    ///     42
    /// });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (transmitter, receiver) = mpsc::channel();

        self.spawn(async move {
            let result = CatchUnwind(Box::pin(future)).await;
            let _ = transmitter.send(result);
        });

        match receiver.recv() {
            Ok(Ok(output)) => output,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("block_on future did not complete"),
        }
    }
}

/// Completes with the panic payload instead of unwinding through the
/// worker.
struct CatchUnwind<F>(Pin<Box<F>>);

impl<F: Future> Future for CatchUnwind<F> {
    type Output = thread::Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let future = self.0.as_mut();

        match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

impl Drop for Runtime {
    /// Shuts down the runtime.
    ///
    /// 1. Signals the executor to shut down.
    /// 2. Sends a shutdown command to the timer driver.
    /// 3. Joins all worker threads and the driver.
    fn drop(&mut self) {
        self.executor.shutdown();

        let _ = self.timer.send(Command::Shutdown);

        self.executor.join();

        if let Some(thread) = self.timer_thread.take() {
            let _ = thread.join();
        }

        log::debug!("runtime stopped");
    }
}
