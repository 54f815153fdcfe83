//! Task executor implementation.
//!
//! - [`core`]: worker thread lifecycle and task submission,
//! - [`worker`]: the per-thread run loop.

pub(crate) mod core;
pub(crate) mod worker;
