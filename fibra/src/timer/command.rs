use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::task::Waker;
use std::time::Instant;

/// Messages accepted by the timer driver.
pub(crate) enum Command {
    /// Wake `waker` once `deadline` is reached, unless `cancelled` is set
    /// by then.
    SetTimer {
        deadline: Instant,
        waker: Waker,
        cancelled: Arc<AtomicBool>,
    },

    /// Stop the driver thread. Pending timers are dropped without firing.
    Shutdown,
}
