use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bit marking the mutex as owned.
pub(crate) const LOCK_FLAG: u32 = 1 << 31;

/// Bits counting tasks that entered the slow path.
pub(crate) const TALLY_MASK: u32 = LOCK_FLAG - 1;

/// A snapshot of the lock word.
///
/// The top bit is the lock flag. The remaining bits hold the waiter tally,
/// a best-effort count of tasks that went down the slow path. A zero tally
/// means unlock has nobody to wake; any other value is only a hint.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct State(u32);

impl State {
    #[cfg(test)]
    pub(crate) const UNLOCKED: State = State(0);

    #[cfg(test)]
    pub(crate) const fn from_bits(bits: u32) -> Self {
        State(bits)
    }

    #[cfg(test)]
    pub(crate) const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if the lock flag is set.
    pub(crate) const fn is_locked(self) -> bool {
        self.0 & LOCK_FLAG != 0
    }

    /// Returns the waiter tally.
    pub(crate) const fn waiters(self) -> u32 {
        self.0 & TALLY_MASK
    }

    const fn with_lock(self) -> Self {
        State(self.0 | LOCK_FLAG)
    }

    const fn without_lock(self) -> Self {
        State(self.0 & !LOCK_FLAG)
    }

    fn add_waiter(self) -> Self {
        debug_assert!(self.waiters() < TALLY_MASK, "waiter tally overflow");
        State(self.0 + 1)
    }

    fn remove_waiter(self) -> Self {
        debug_assert!(self.waiters() > 0, "waiter tally underflow");
        State(self.0 - 1)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("locked", &self.is_locked())
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// The atomic word behind every mutex.
///
/// All transitions except [`unlock`](Self::unlock) are compare-and-swap
/// retry loops.
pub(crate) struct LockWord(AtomicU32);

impl LockWord {
    pub(crate) const fn new() -> Self {
        LockWord(AtomicU32::new(0))
    }

    pub(crate) fn load(&self) -> State {
        State(self.0.load(Ordering::Acquire))
    }

    /// Runs `f` on the current value until the CAS installing its result
    /// succeeds, and returns the value that was replaced.
    ///
    /// `start` seeds the first attempt. A wrong guess only costs one
    /// failed CAS.
    fn transition(&self, start: State, f: impl Fn(State) -> State) -> State {
        let mut current = start;
        loop {
            let next = f(current);
            match self.0.compare_exchange_weak(
                current.0,
                next.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current,
                Err(actual) => current = State(actual),
            }
        }
    }

    /// Sets the lock flag. Returns `true` if it was previously clear.
    ///
    /// The tally is never touched, so this never interacts with the wait
    /// queue.
    pub(crate) fn try_lock(&self) -> bool {
        let prev = self.transition(self.load(), State::with_lock);
        !prev.is_locked()
    }

    /// Either counts the caller as a waiter (flag set) or takes the lock
    /// for it (flag clear).
    ///
    /// Returns the replaced word: if it is locked, the caller was counted
    /// and has to wait.
    pub(crate) fn mark_waiting_and_try_lock(&self) -> State {
        self.transition(self.load(), |s| {
            if s.is_locked() {
                s.add_waiter()
            } else {
                s.with_lock()
            }
        })
    }

    /// Called by a counted waiter after it was resumed.
    ///
    /// If the flag is clear, the waiter leaves the tally and takes the
    /// lock. If somebody else holds it, the word is left as is and the
    /// waiter stays counted. Returns the replaced word; a locked result
    /// means the caller must wait again.
    pub(crate) fn clear_waiting_and_try_lock(&self) -> State {
        // Woken waiters usually find the flag clear, so guess that first.
        self.transition(self.load().without_lock(), |s| {
            if s.is_locked() {
                s
            } else {
                s.remove_waiter().with_lock()
            }
        })
    }

    /// Removes a counted waiter that gives up (timeout or cancellation).
    pub(crate) fn abandon_wait(&self) {
        self.transition(self.load(), State::remove_waiter);
    }

    /// Clears the lock flag by adding it once more.
    ///
    /// The flag is the top bit, so the addition overflows it back to zero
    /// without any carry into the tally. Returns the word before the
    /// addition.
    ///
    /// # Panics
    ///
    /// Panics if the flag is not set.
    pub(crate) fn unlock(&self) -> State {
        assert!(self.load().is_locked(), "unlock of an unlocked mutex");

        let prev = State(self.0.fetch_add(LOCK_FLAG, Ordering::AcqRel));
        debug_assert!(prev.is_locked());
        prev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn try_lock_only_succeeds_when_clear() {
        let word = LockWord::new();
        assert!(word.try_lock());
        assert!(!word.try_lock());
        assert_eq!(word.load(), State::from_bits(LOCK_FLAG));
    }

    #[test]
    fn try_lock_keeps_the_tally() {
        let word = LockWord::new();
        assert!(word.try_lock());
        word.mark_waiting_and_try_lock();
        word.unlock();

        assert!(word.try_lock());
        assert_eq!(word.load().waiters(), 1);
    }

    #[test]
    fn mark_waiting_takes_a_free_lock() {
        let word = LockWord::new();
        let prev = word.mark_waiting_and_try_lock();

        assert!(!prev.is_locked());
        assert!(word.load().is_locked());
        assert_eq!(word.load().waiters(), 0);
    }

    #[test]
    fn mark_waiting_counts_when_held() {
        let word = LockWord::new();
        word.try_lock();

        assert!(word.mark_waiting_and_try_lock().is_locked());
        assert!(word.mark_waiting_and_try_lock().is_locked());
        assert_eq!(word.load().waiters(), 2);
    }

    #[test]
    fn clear_waiting_leaves_a_held_word_alone() {
        let word = LockWord::new();
        word.try_lock();
        word.mark_waiting_and_try_lock();

        let before = word.load();
        assert!(word.clear_waiting_and_try_lock().is_locked());
        assert_eq!(word.load(), before);
    }

    #[test]
    fn clear_waiting_hands_over_after_unlock() {
        let word = LockWord::new();
        word.try_lock();
        word.mark_waiting_and_try_lock();
        word.mark_waiting_and_try_lock();
        word.unlock();

        assert!(!word.clear_waiting_and_try_lock().is_locked());
        let now = word.load();
        assert!(now.is_locked());
        assert_eq!(now.waiters(), 1);
    }

    #[test]
    fn unlock_overflows_only_the_flag() {
        let word = LockWord::new();
        word.try_lock();
        for _ in 0..5 {
            word.mark_waiting_and_try_lock();
        }

        let prev = word.unlock();
        assert!(prev.is_locked());
        assert_eq!(word.load(), State::from_bits(5));
    }

    #[test]
    fn unlock_at_full_tally_does_not_carry() {
        let word = LockWord(AtomicU32::new(LOCK_FLAG | TALLY_MASK));
        word.unlock();
        assert_eq!(word.load().bits(), TALLY_MASK);
    }

    #[test]
    #[should_panic(expected = "unlock of an unlocked mutex")]
    fn unlock_without_lock_panics() {
        LockWord::new().unlock();
    }

    #[test]
    fn abandon_wait_restores_the_tally() {
        let word = LockWord::new();
        word.try_lock();
        word.mark_waiting_and_try_lock();
        word.abandon_wait();
        assert_eq!(word.load(), State::from_bits(LOCK_FLAG));
    }

    #[test]
    fn lock_unlock_round_trip_keeps_word_clean() {
        let word = LockWord::new();
        for _ in 0..1_000 {
            assert!(word.try_lock());
            word.unlock();
            assert_eq!(word.load(), State::UNLOCKED);
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        TryLock,
        Mark,
        Resume,
        Abandon,
        Unlock,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::TryLock),
            Just(Op::Mark),
            Just(Op::Resume),
            Just(Op::Abandon),
            Just(Op::Unlock),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        /// Drives the word with a single-threaded schedule and checks it
        /// against a plain `(locked, waiters)` model. Operations whose
        /// precondition does not hold in the model are skipped.
        #[test]
        fn word_tracks_model(ops in proptest::collection::vec(op(), 1..200)) {
            let word = LockWord::new();
            let mut locked = false;
            let mut waiters = 0u32;

            for op in ops {
                match op {
                    Op::TryLock => {
                        let won = word.try_lock();
                        prop_assert_eq!(won, !locked);
                        locked = true;
                    }
                    Op::Mark => {
                        let prev = word.mark_waiting_and_try_lock();
                        prop_assert_eq!(prev.is_locked(), locked);
                        if locked {
                            waiters += 1;
                        } else {
                            locked = true;
                        }
                    }
                    Op::Resume if waiters > 0 => {
                        let prev = word.clear_waiting_and_try_lock();
                        prop_assert_eq!(prev.is_locked(), locked);
                        if !locked {
                            waiters -= 1;
                            locked = true;
                        }
                    }
                    Op::Abandon if waiters > 0 => {
                        word.abandon_wait();
                        waiters -= 1;
                    }
                    Op::Unlock if locked => {
                        let prev = word.unlock();
                        prop_assert_eq!(prev.waiters(), waiters);
                        locked = false;
                    }
                    _ => {}
                }

                let now = word.load();
                prop_assert_eq!(now.is_locked(), locked);
                prop_assert_eq!(now.waiters(), waiters);
            }
        }
    }
}
