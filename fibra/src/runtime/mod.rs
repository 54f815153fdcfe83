//! Core runtime components.
//!
//! The runtime hosts the tasks that contend on the mutexes of
//! [`sync`](crate::sync). It is responsible for:
//! - executing asynchronous tasks on a pool of worker threads,
//! - managing task queues and work stealing,
//! - tracking the task currently polled on each thread,
//! - enabling cooperative multitasking via yielding.

mod core;
mod executor;
mod scheduler;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod yield_now;

pub mod task;

pub use self::core::Runtime;
