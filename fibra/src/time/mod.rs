//! Time utilities.
//!
//! This module provides time-related asynchronous utilities that
//! integrate with the runtime timer driver:
//! - [`sleep`] and [`sleep_until`] for suspending a task,
//! - [`timeout`] for bounding how long a future may run.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep, sleep_until};

#[doc(inline)]
pub use timeout::{Elapsed, Timeout, timeout};
