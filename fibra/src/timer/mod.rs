//! Timer driver.
//!
//! The driver runs on its own thread and owns a min-heap of pending
//! deadlines. Futures talk to it through a [`TimerHandle`] by sending
//! [`Command`]s; expired timers are fired by waking their task.
//!
//! Most users never touch the driver directly: [`time::sleep`] and the
//! timed mutex operations register their deadlines here.
//!
//! [`time::sleep`]: crate::time::sleep

mod driver;
mod entry;

pub(crate) mod command;

pub(crate) use driver::{TimerDriver, TimerHandle};
