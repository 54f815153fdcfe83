//! Run queues of the work-stealing scheduler.
//!
//! - [`injector`]: the global queue fed by `Runtime::spawn`, wakeups,
//!   and spawns from outside a worker; also where idle workers park.
//! - [`local`]: one queue per worker, popped LIFO by its owner and stolen
//!   FIFO by peers.

pub(crate) mod injector;
pub(crate) mod local;
