//! # Fibra
//!
//! **Fibra** is a small cooperative task runtime built around a mutex that
//! never blocks a worker thread.
//!
//! Many lightweight tasks are multiplexed over a few OS threads by a
//! work-stealing executor. When a task cannot take a [`sync::Mutex`], it
//! is counted in the mutex's lock word, parked on a FIFO wait queue and
//! resumed through its waker once the lock is released. The worker thread
//! moves on to other tasks in the meantime.
//!
//! It offers:
//!
//! - A **work-stealing scheduler** that distributes tasks across worker
//!   threads
//! - **Parking mutexes**: [`sync::Mutex`], [`sync::TimedMutex`] and the
//!   data-less [`sync::RawMutex`]
//! - **Timer primitives**: sleep and timeout, also used to bound lock
//!   attempts
//! - **Entry macros** `#[fibra::main]` and `#[fibra::test]`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fibra::sync::Mutex;
//! use fibra::task;
//! use std::sync::Arc;
//!
//! #[fibra::main]
//! async fn main() {
//!     let counter = Arc::new(Mutex::new(0));
//!
//!     let handles: Vec<_> = (0..8)
//!         .map(|_| {
//!             let counter = counter.clone();
//!             task::spawn(async move {
//!                 *counter.lock().await += 1;
//!             })
//!         })
//!         .collect();
//!
//!     for handle in handles {
//!         handle.await;
//!     }
//!
//!     assert_eq!(*counter.lock().await, 8);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`sync`]: parking mutexes and their guards
//! - [`task`]: spawning and task identity
//! - [`time`]: sleep and timeout
//!
//! ## Logging
//!
//! Fibra reports through the [`log`] facade: runtime lifecycle at `debug`,
//! lock hand-offs at `trace`, and mutexes destroyed with parked waiters at
//! `error`. Install any `log` backend to see them.

mod runtime;
mod timer;
mod utils;

pub mod sync;
pub mod time;

pub use runtime::Runtime;
pub use runtime::builder::RuntimeBuilder;
pub use runtime::task;
pub use runtime::yield_now::yield_now;

pub use fibra_macros::{main, test};
