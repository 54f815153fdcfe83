use super::deadline::Deadline;
use super::state::LockWord;
use super::wait_queue::{Wait, WaitQueue, Wakeup};

use std::fmt;
use std::future::Future;
use std::time::Instant;

/// A data-less mutex exposing the lock protocol directly.
///
/// The fast path is a single compare-and-swap on the lock word. A task
/// that loses the race is counted in the word's waiter tally and parks on
/// a FIFO queue guarded by a small spinlock. The spinlock is held only to
/// link or unlink a queue slot, never while a task is suspended or woken.
///
/// Unlocking wakes the oldest parked task, but does not hand the lock over:
/// a task calling [`try_lock`](Self::try_lock) or [`lock`](Self::lock) at
/// the right moment can take it first, and the woken task parks again at
/// the back of the queue.
///
/// Most code wants [`Mutex`](super::Mutex) instead, which ties the lock to
/// the data it protects and unlocks through a guard.
///
/// # Panics
///
/// Dropping a `RawMutex` while tasks are still parked on it logs every
/// stranded waiter at `error` level and panics.
pub struct RawMutex {
    state: LockWord,
    queue: spin::Mutex<WaitQueue>,
    label: Option<&'static str>,
}

impl RawMutex {
    /// Creates an unlocked mutex.
    pub const fn new() -> Self {
        Self {
            state: LockWord::new(),
            queue: spin::Mutex::new(WaitQueue::new()),
            label: None,
        }
    }

    /// Creates an unlocked mutex with a label shown in diagnostics.
    pub const fn with_label(label: &'static str) -> Self {
        Self {
            state: LockWord::new(),
            queue: spin::Mutex::new(WaitQueue::new()),
            label: Some(label),
        }
    }

    /// Attempts to take the lock without waiting.
    ///
    /// Never touches the wait queue, and succeeds whenever the lock is
    /// free, even if tasks are parked.
    pub fn try_lock(&self) -> bool {
        self.state.try_lock()
    }

    /// Takes the lock, parking the current task until it is available.
    ///
    /// Dropping the returned future while it is parked gives up the wait
    /// without taking the lock.
    pub async fn lock(&self) {
        if self.try_lock() {
            return;
        }

        if !self.state.mark_waiting_and_try_lock().is_locked() {
            return;
        }

        let tally = WaitingTally::new(&self.state);

        loop {
            self.wait(None).await;

            if !self.state.clear_waiting_and_try_lock().is_locked() {
                tally.disarm();
                return;
            }

            log::trace!("{}: lock taken before resumed waiter, parking again", self);
        }
    }

    /// Takes the lock unless `deadline` passes first.
    ///
    /// Returns `true` once the lock is held, `false` on timeout. A deadline
    /// that has already passed still gets the fast path. The deadline is
    /// fixed when this method is called, not when the future is first
    /// polled.
    ///
    /// # Panics
    ///
    /// Parking with a deadline still in the future requires a timer, so
    /// the future panics if it has to park outside a `fibra` runtime.
    pub fn timed_lock(&self, deadline: impl Into<Deadline>) -> impl Future<Output = bool> + '_ {
        self.lock_until(deadline.into().instant())
    }

    async fn lock_until(&self, deadline: Instant) -> bool {
        if self.try_lock() {
            return true;
        }

        if !self.state.mark_waiting_and_try_lock().is_locked() {
            return true;
        }

        let tally = WaitingTally::new(&self.state);

        loop {
            if self.wait(Some(deadline)).await == Wakeup::TimedOut {
                log::trace!("{}: timed out", self);
                return false;
            }

            if !self.state.clear_waiting_and_try_lock().is_locked() {
                tally.disarm();
                return true;
            }
        }
    }

    fn wait(&self, deadline: Option<Instant>) -> Wait<'_> {
        Wait::new(&self.state, &self.queue, deadline)
    }

    /// Releases the lock and wakes the oldest parked task, if any.
    ///
    /// The lock can be released from any task or thread, not only the one
    /// that took it.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is not locked.
    pub fn unlock(&self) {
        let prev = self.state.unlock();

        if prev.waiters() == 0 {
            return;
        }

        let waker = self.queue.lock().notify_one();

        if let Some(waker) = waker {
            log::trace!("{}: waking next waiter", self);
            waker.wake();
        }
    }

    /// Returns `true` if the mutex is currently held.
    pub fn is_locked(&self) -> bool {
        self.state.load().is_locked()
    }

    /// Returns the waiter tally: the number of tasks that went down the
    /// slow path and have neither taken the lock nor given up.
    ///
    /// This is a snapshot and may include tasks that are about to park or
    /// that were just woken.
    pub fn waiters(&self) -> u32 {
        self.state.load().waiters()
    }

    /// Returns the number of tasks currently parked in the wait queue.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns the diagnostic label, if any.
    pub fn label(&self) -> Option<&'static str> {
        self.label
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "mutex '{label}'"),
            None => f.write_str("mutex"),
        }
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("RawMutex")
            .field("label", &self.label)
            .field("locked", &state.is_locked())
            .field("waiters", &state.waiters())
            .finish()
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        let queue = self.queue.get_mut();

        if queue.is_empty() {
            return;
        }

        let label = self.label.unwrap_or("<unlabeled>");

        log::error!(
            "mutex '{label}' destroyed with {} parked waiters",
            queue.len()
        );
        for waiter in queue.iter() {
            log::error!("mutex '{label}': stranded waiter {waiter}");
        }

        // Already unwinding: a second panic would abort.
        if !std::thread::panicking() {
            panic!("mutex '{label}' destroyed while tasks are waiting on it");
        }
    }
}

/// Undoes a waiter tally increment unless disarmed.
///
/// Covers both the timeout path and a lock future dropped mid-wait.
struct WaitingTally<'a> {
    state: &'a LockWord,
}

impl<'a> WaitingTally<'a> {
    fn new(state: &'a LockWord) -> Self {
        Self { state }
    }

    /// The tally slot was consumed by taking the lock.
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for WaitingTally<'_> {
    fn drop(&mut self) {
        self.state.abandon_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::{Pin, pin};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll, Wake, Waker};
    use std::time::Duration;

    static_assertions::assert_impl_all!(RawMutex: Send, Sync, Default);
    static_assertions::assert_not_impl_any!(RawMutex: Clone, Copy);

    struct Counter(AtomicUsize);

    impl Wake for Counter {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn poll_once<F: Future + ?Sized>(fut: Pin<&mut F>) -> Poll<F::Output> {
        fut.poll(&mut Context::from_waker(Waker::noop()))
    }

    #[test]
    fn try_lock_reports_ownership() {
        let mutex = RawMutex::new();

        assert!(mutex.try_lock());
        assert!(!mutex.try_lock());
        assert!(mutex.is_locked());

        mutex.unlock();
        assert!(!mutex.is_locked());
        assert!(mutex.try_lock());
        mutex.unlock();
    }

    #[test]
    fn uncontended_lock_is_immediate() {
        let mutex = RawMutex::new();
        let mut fut = pin!(mutex.lock());

        assert!(poll_once(fut.as_mut()).is_ready());
        assert!(mutex.is_locked());
        assert_eq!(mutex.waiters(), 0);
    }

    #[test]
    fn contended_lock_parks_and_counts() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let mut fut = pin!(mutex.lock());
        assert!(poll_once(fut.as_mut()).is_pending());
        assert_eq!(mutex.waiters(), 1);
        assert_eq!(mutex.queued(), 1);

        mutex.unlock();
        assert_eq!(mutex.queued(), 0);

        assert!(poll_once(fut.as_mut()).is_ready());
        assert!(mutex.is_locked());
        assert_eq!(mutex.waiters(), 0);
        mutex.unlock();
    }

    #[test]
    fn waiters_are_woken_in_arrival_order() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let counters: Vec<_> = (0..4).map(|_| Arc::new(Counter(AtomicUsize::new(0)))).collect();
        let mut futs: Vec<_> = (0..4).map(|_| Box::pin(mutex.lock())).collect();

        for (fut, counter) in futs.iter_mut().zip(&counters) {
            let waker = Waker::from(counter.clone());
            assert!(fut.as_mut().poll(&mut Context::from_waker(&waker)).is_pending());
        }

        for i in 0..4 {
            mutex.unlock();

            let woken: Vec<_> = counters.iter().map(|c| c.0.load(Ordering::SeqCst)).collect();
            let expected: Vec<_> = (0..4).map(|j| usize::from(j <= i)).collect();
            assert_eq!(woken, expected);

            assert!(poll_once(futs[i].as_mut()).is_ready());
        }

        assert_eq!(mutex.waiters(), 0);
        mutex.unlock();
    }

    #[test]
    fn barging_sends_woken_waiter_to_the_back() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let mut first = Box::pin(mutex.lock());
        let mut second = Box::pin(mutex.lock());
        assert!(poll_once(first.as_mut()).is_pending());
        assert!(poll_once(second.as_mut()).is_pending());

        mutex.unlock();
        assert!(mutex.try_lock());

        // Woken, but the lock is gone: parks again behind `second`.
        assert!(poll_once(first.as_mut()).is_pending());
        assert_eq!(mutex.waiters(), 2);
        assert_eq!(mutex.queued(), 2);

        mutex.unlock();
        assert!(poll_once(first.as_mut()).is_pending());
        assert!(poll_once(second.as_mut()).is_ready());

        mutex.unlock();
        assert!(poll_once(first.as_mut()).is_ready());
        mutex.unlock();
        assert_eq!(mutex.waiters(), 0);
    }

    #[test]
    fn unlock_without_waiters_skips_the_queue() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let guard = mutex.queue.lock();
        // Would spin forever if unlock took the spinlock.
        mutex.unlock();
        drop(guard);

        assert!(!mutex.is_locked());
    }

    #[test]
    fn cancelled_lock_restores_tally_and_queue() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        {
            let mut fut = Box::pin(mutex.lock());
            assert!(poll_once(fut.as_mut()).is_pending());
            assert_eq!(mutex.waiters(), 1);
        }

        assert_eq!(mutex.waiters(), 0);
        assert_eq!(mutex.queued(), 0);
        mutex.unlock();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn cancelled_woken_waiter_forwards_the_wakeup() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let mut first = Box::pin(mutex.lock());
        let mut second = Box::pin(mutex.lock());

        assert!(poll_once(first.as_mut()).is_pending());
        let waker = Waker::from(counter.clone());
        assert!(second.as_mut().poll(&mut Context::from_waker(&waker)).is_pending());

        mutex.unlock();
        drop(first);

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(poll_once(second.as_mut()).is_ready());
        assert_eq!(mutex.waiters(), 0);
        mutex.unlock();
    }

    #[test]
    fn timed_lock_succeeds_on_free_mutex_even_past_deadline() {
        let mutex = RawMutex::new();
        let mut fut = pin!(mutex.timed_lock(Instant::now() - Duration::from_secs(1)));

        assert_eq!(poll_once(fut.as_mut()), Poll::Ready(true));
        assert!(mutex.is_locked());
        mutex.unlock();
    }

    #[test]
    fn expired_timed_lock_restores_the_tally() {
        let mutex = RawMutex::new();
        assert!(mutex.try_lock());

        let mut fut = pin!(mutex.timed_lock(Instant::now()));

        assert_eq!(poll_once(fut.as_mut()), Poll::Ready(false));
        assert_eq!(mutex.waiters(), 0);
        assert_eq!(mutex.queued(), 0);
        assert!(mutex.is_locked());
        mutex.unlock();
    }

    #[test]
    fn round_trip_leaves_state_clean() {
        let mutex = RawMutex::with_label("round-trip");

        for _ in 0..100 {
            let mut fut = pin!(mutex.lock());
            assert!(poll_once(fut.as_mut()).is_ready());
            mutex.unlock();
            assert!(!mutex.is_locked());
            assert_eq!(mutex.waiters(), 0);
        }
    }

    #[test]
    #[should_panic(expected = "unlock of an unlocked mutex")]
    fn unlock_of_unlocked_mutex_panics() {
        RawMutex::new().unlock();
    }

    #[test]
    fn display_uses_the_label() {
        assert_eq!(RawMutex::with_label("db").to_string(), "mutex 'db'");
        assert_eq!(RawMutex::new().to_string(), "mutex");
        assert_eq!(RawMutex::with_label("db").label(), Some("db"));
    }
}
