use std::sync::atomic::{AtomicUsize, Ordering};

use strum::{Display, FromRepr};

/// Scheduling state of a runtime task.
///
/// Stored as a `usize` inside [`AtomicState`] so transitions can be done
/// with compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(usize)]
pub enum TaskState {
    /// Suspended and not scheduled. A wake moves it to `Queued`.
    Idle = 0,

    /// Waiting in a run queue.
    Queued = 1,

    /// Being polled by a worker. At most one worker observes this state.
    Running = 2,

    /// The future returned `Poll::Ready` and will not be polled again.
    Completed = 3,

    /// Woken while running; re-queued as soon as the current poll ends.
    Notified = 4,
}

/// Atomic cell holding a [`TaskState`].
pub(crate) struct AtomicState(AtomicUsize);

impl AtomicState {
    pub(crate) const fn new(state: TaskState) -> Self {
        Self(AtomicUsize::new(state as usize))
    }

    pub(crate) fn load(&self) -> TaskState {
        let raw = self.0.load(Ordering::Acquire);
        // Only `TaskState` discriminants are ever stored.
        TaskState::from_repr(raw).unwrap_or(TaskState::Completed)
    }

    pub(crate) fn store(&self, state: TaskState) {
        self.0.store(state as usize, Ordering::Release);
    }

    /// Moves from `from` to `to`. Returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as usize, to as usize, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
