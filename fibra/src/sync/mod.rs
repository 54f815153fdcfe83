//! Synchronization primitives.
//!
//! The mutexes in this module never block a worker thread. A task that
//! cannot take the lock right away is counted in the lock word, parked on
//! a FIFO wait queue, and resumed through its waker once the lock is
//! released.
//!
//! - [`Mutex`] (also exported as [`TryMutex`]): protects a value and
//!   hands out [`MutexGuard`]s.
//! - [`TimedMutex`]: a [`Mutex`] that can also give up after a
//!   [`Deadline`].
//! - [`RawMutex`]: the data-less core, with a `bool`-returning API.
//!
//! Wakeups are FIFO, acquisition is not: a task trying the lock at the
//! moment it is released may take it before the woken waiter does.
//!
//! None of the locks is re-entrant. Locking a mutex the current task
//! already holds parks that task forever.

mod deadline;
mod mutex;
mod raw;
mod state;
mod wait_queue;

pub use deadline::Deadline;
pub use mutex::{LockTimeout, Mutex, MutexGuard, TimedMutex, TryMutex};
pub use raw::RawMutex;
