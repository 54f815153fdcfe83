use super::deadline::Deadline;
use super::raw::RawMutex;

use std::cell::UnsafeCell;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// An asynchronous mutex.
///
/// `Mutex<T>` provides mutual exclusion for async tasks. Unlike
/// `std::sync::Mutex`, it does not block threads when waiting; tasks that
/// cannot acquire the lock are suspended and woken up when the mutex
/// becomes available.
///
/// # Examples
///
/// ```rust,ignore
/// let counter = Arc::new(Mutex::new(0));
///
/// let c = counter.clone();
/// task::spawn(async move {
///     *c.lock().await += 1;
/// });
/// ```
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,

    /// The underlying data protected by the mutex.
    data: UnsafeCell<T>,
}

/// A mutex offering only `lock` and `try_lock`.
pub type TryMutex<T> = Mutex<T>;

// SAFETY: the lock serializes every access to `data`.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new, unlocked mutex wrapping the given value.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Creates a new mutex whose label appears in diagnostics.
    pub const fn with_label(value: T, label: &'static str) -> Self {
        Self {
            raw: RawMutex::with_label(label),
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex, suspending the current task until it is free.
    ///
    /// Dropping the returned future before it completes abandons the wait
    /// without acquiring the lock.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.lock().await;
        MutexGuard::new(self)
    }

    /// Attempts to acquire the mutex without waiting.
    ///
    /// Succeeds whenever the lock is free, even if other tasks are queued.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.raw.try_lock().then(|| MutexGuard::new(self))
    }

    /// Returns `true` if the mutex is currently held.
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns the waiter tally. See [`RawMutex::waiters`].
    pub fn waiters(&self) -> u32 {
        self.raw.waiters()
    }

    /// Returns the diagnostic label, if any.
    pub fn label(&self) -> Option<&'static str> {
        self.raw.label()
    }

    /// Returns a mutable reference to the data.
    ///
    /// No locking is needed: the exclusive borrow proves nobody else can
    /// hold the lock.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");

        if let Some(label) = self.raw.label() {
            d.field("label", &label);
        }

        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };

        d.finish_non_exhaustive()
    }
}

/// A [`Mutex`] whose acquisition can be bounded in time.
///
/// Guards are the same [`MutexGuard`] a plain mutex hands out.
///
/// # Examples
///
/// ```rust,ignore
/// let mutex = TimedMutex::new(Vec::new());
///
/// match mutex.lock_for(Duration::from_millis(50)).await {
///     Ok(mut guard) => guard.push(1),
///     Err(LockTimeout) => log::warn!("busy"),
/// }
/// ```
pub struct TimedMutex<T: ?Sized> {
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub const fn with_label(value: T, label: &'static str) -> Self {
        Self {
            inner: Mutex::with_label(value, label),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> TimedMutex<T> {
    /// Acquires the mutex unless `deadline` passes first.
    ///
    /// The deadline is fixed when this method is called. A deadline that
    /// has already passed still succeeds if the lock is free.
    ///
    /// # Panics
    ///
    /// Waiting for a deadline requires the `fibra` timer, so the future
    /// panics if it has to wait outside a `fibra` runtime.
    pub fn timed_lock(
        &self,
        deadline: impl Into<Deadline>,
    ) -> impl Future<Output = Result<MutexGuard<'_, T>, LockTimeout>> + '_ {
        let locked = self.inner.raw.timed_lock(deadline);

        async move {
            if locked.await {
                Ok(MutexGuard::new(&self.inner))
            } else {
                Err(LockTimeout)
            }
        }
    }

    /// Acquires the mutex unless `deadline` passes first.
    pub async fn lock_until(&self, deadline: Instant) -> Result<MutexGuard<'_, T>, LockTimeout> {
        self.timed_lock(deadline).await
    }

    /// Acquires the mutex unless `timeout` elapses first.
    pub fn lock_for(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<MutexGuard<'_, T>, LockTimeout>> + '_ {
        let deadline = Deadline::after(timeout);
        self.lock_until(deadline.instant())
    }

    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn waiters(&self) -> u32 {
        self.inner.waiters()
    }

    pub fn label(&self) -> Option<&'static str> {
        self.inner.label()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T: Default> Default for TimedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for TimedMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for TimedMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TimedMutex").field(&&self.inner).finish()
    }
}

/// RAII guard returned by the mutex lock operations.
///
/// Releases the mutex when dropped.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,

    /// `Sync` only when `T` is, since the guard hands out `&T`.
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    fn new(mutex: &'a Mutex<T>) -> Self {
        Self {
            mutex,
            _marker: PhantomData,
        }
    }

    /// Releases the lock now.
    ///
    /// Equivalent to dropping the guard.
    pub fn unlock(guard: Self) {
        drop(guard);
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    /// Unlocks the mutex and wakes the oldest waiting task, if any.
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the guard proves the lock is held, and `&mut self`
        // proves this is the only reference derived from it.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Error returned when a timed lock attempt reaches its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out waiting for mutex")
    }
}

impl Error for LockTimeout {}
