//! Asynchronous task primitives.
//!
//! This module defines how the runtime represents, schedules, and
//! identifies tasks:
//! - [`spawn`] and [`JoinHandle`] for running futures,
//! - [`TaskId`] and [`current_id`] for task identity,
//! - the type-erased `Runnable` trait used by the executor and by the
//!   mutex wait queue.

pub(crate) mod handle;
pub(crate) mod id;
pub(crate) mod state;
pub(crate) mod waker;

mod core;

pub(crate) use self::core::{Runnable, Task, TaskRef};

pub use self::core::spawn;
pub use handle::JoinHandle;
pub use id::{TaskId, current_id};
pub use state::TaskState;
