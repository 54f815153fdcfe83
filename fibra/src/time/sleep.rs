use crate::runtime::context::CURRENT_TIMER;
use crate::sync::Deadline;
use crate::timer::command::Command;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// Durations too large for the clock sleep for roughly thirty years.
///
/// # Panics
///
/// Panics if polled outside of a running runtime before the duration has
/// elapsed.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::until(Deadline::after(duration).instant())
}

/// Creates a future that completes once `deadline` is reached.
///
/// A deadline in the past completes on the first poll.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep::until(deadline)
}

/// A future that completes once a specific deadline is reached.
///
/// The timer is registered with the driver on first poll and cancelled if
/// the future is dropped before completion, so dropping it never causes a
/// spurious wake-up.
pub struct Sleep {
    deadline: Instant,

    /// Whether the timer has already been registered with the driver.
    registered: bool,

    /// Cancellation flag shared with the driver.
    cancelled: Arc<AtomicBool>,
}

impl Sleep {
    pub(crate) fn until(deadline: Instant) -> Self {
        Self {
            deadline,
            registered: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the instant at which the future completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has been reached.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.is_elapsed() {
            return Poll::Ready(());
        }

        if !this.registered {
            this.registered = true;

            CURRENT_TIMER.with(|cell| {
                let binding = cell.borrow();
                let timer = binding.as_ref().expect("Sleep polled outside of runtime");

                let _ = timer.send(Command::SetTimer {
                    deadline: this.deadline,
                    waker: cx.waker().clone(),
                    cancelled: this.cancelled.clone(),
                });
            });
        }

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::pin;
    use std::task::Waker;

    #[test]
    fn past_deadline_is_ready_without_runtime() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(sleep_until(Instant::now() - Duration::from_millis(1)));

        assert!(fut.as_mut().poll(&mut cx).is_ready());
    }

    #[test]
    fn unbounded_duration_does_not_overflow() {
        let sleep = sleep(Duration::MAX);

        assert!(!sleep.is_elapsed());
        assert!(sleep.deadline() > Instant::now() + Duration::from_secs(86_400 * 365));
    }

    #[test]
    #[should_panic(expected = "Sleep polled outside of runtime")]
    fn future_deadline_needs_a_runtime() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut fut = pin!(sleep(Duration::from_secs(60)));

        let _ = fut.as_mut().poll(&mut cx);
    }
}
