use std::time::{Duration, Instant};

/// Stand-in for timeouts too large to represent as an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// An absolute point in time bounding a timed lock attempt.
///
/// Built from an [`Instant`] as is, or from a [`Duration`] measured from
/// the moment of conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout` from now.
    ///
    /// A timeout that overflows the clock is clamped to roughly thirty
    /// years, which is never reached in practice.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();

        Deadline(now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE))
    }

    pub fn instant(self) -> Instant {
        self.0
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn has_passed(self) -> bool {
        Instant::now() >= self.0
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Deadline(instant)
    }
}

impl From<Duration> for Deadline {
    fn from(timeout: Duration) -> Self {
        Deadline::after(timeout)
    }
}
