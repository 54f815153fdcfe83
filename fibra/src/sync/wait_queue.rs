//! FIFO queue of suspended lock waiters.
//!
//! Waiter slots live in a [`Slab`] and are chained into a doubly-linked
//! list by slot key, so any slot can be unlinked in O(1) without walking
//! the queue. A slot belongs to the [`Wait`] future that created it: the
//! queue may unlink it when waking its task, but only the future frees
//! it, which it always does on drop.

use super::state::LockWord;
use crate::runtime::context::CURRENT_TASK;
use crate::runtime::task::{TaskId, TaskRef, TaskState};
use crate::time::Sleep;
use crate::utils::Slab;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

/// A suspended task as recorded in the queue.
pub(crate) struct Waiter {
    /// Runtime task that suspended, if the future runs inside a `fibra`
    /// runtime. Kept for diagnostics only.
    task: Option<TaskRef>,

    waker: Waker,
}

impl Waiter {
    /// Captures the task currently polled on this thread.
    fn current(waker: &Waker) -> Self {
        Self {
            task: CURRENT_TASK.with(|cell| cell.borrow().clone()),
            waker: waker.clone(),
        }
    }

    pub(crate) fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(|task| task.id())
    }

    pub(crate) fn task_state(&self) -> Option<TaskState> {
        self.task.as_ref().map(|task| task.state())
    }
}

impl fmt::Display for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.task_id(), self.task_state()) {
            (Some(id), Some(state)) => write!(f, "{id} ({state})"),
            _ => f.write_str("<foreign task>"),
        }
    }
}

struct Slot {
    waiter: Waiter,
    prev: Option<usize>,
    next: Option<usize>,

    /// Still chained into the list.
    linked: bool,

    /// Unlinked by [`WaitQueue::notify_one`] rather than by its owner.
    notified: bool,
}

/// FIFO of waiter slots. Always accessed under the mutex's spinlock.
pub(crate) struct WaitQueue {
    slots: Slab<Slot>,
    head: Option<usize>,
    tail: Option<usize>,

    /// Number of linked slots.
    linked: usize,
}

impl WaitQueue {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Slab::new(),
            head: None,
            tail: None,
            linked: 0,
        }
    }

    /// Number of linked (not yet notified) waiters.
    pub(crate) fn len(&self) -> usize {
        self.linked
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.linked == 0
    }

    /// Links a new slot at the back and returns its key.
    fn push_back(&mut self, waiter: Waiter) -> usize {
        let key = self.slots.insert(Slot {
            waiter,
            prev: self.tail,
            next: None,
            linked: true,
            notified: false,
        });

        match self.tail {
            Some(tail) => self.slot_mut(tail).next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.linked += 1;

        key
    }

    /// Unlinks the front slot, marks it notified and returns its waker.
    ///
    /// The slot stays allocated until its owner drops.
    pub(crate) fn notify_one(&mut self) -> Option<Waker> {
        let key = self.head?;
        self.unlink(key);

        let slot = self.slot_mut(key);
        slot.notified = true;
        Some(slot.waiter.waker.clone())
    }

    fn is_notified(&self, key: usize) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.notified)
    }

    fn update_waker(&mut self, key: usize, waker: &Waker) {
        let slot = self.slot_mut(key);
        if !slot.waiter.waker.will_wake(waker) {
            slot.waiter.waker = waker.clone();
        }
    }

    /// Unlinks (if needed) and frees a slot. Returns whether it had been
    /// notified.
    fn release(&mut self, key: usize) -> bool {
        if self.slot_mut(key).linked {
            self.unlink(key);
        }
        debug_assert!(self.slots.len() > self.linked);
        self.slots.remove(key).notified
    }

    fn unlink(&mut self, key: usize) {
        let (prev, next) = {
            let slot = self.slot_mut(key);
            debug_assert!(slot.linked, "slot {key} is not linked");
            slot.linked = false;
            (slot.prev.take(), slot.next.take())
        };

        match prev {
            Some(prev) => self.slot_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slot_mut(next).prev = prev,
            None => self.tail = prev,
        }

        self.linked -= 1;
    }

    /// Linked waiters from front to back.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Waiter> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = self.slots.get(cursor?)?;
            cursor = slot.next;
            Some(&slot.waiter)
        })
    }

    fn slot_mut(&mut self, key: usize) -> &mut Slot {
        match self.slots.get_mut(key) {
            Some(slot) => slot,
            None => unreachable!("wait queue slot {key} is vacant"),
        }
    }
}

/// Why a [`Wait`] completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// Woken by an unlock, or never suspended because the lock was already
    /// free. The caller must retry; the lock may have been taken again.
    Resumed,

    /// The deadline passed before any wakeup arrived.
    TimedOut,
}

/// One suspension of the current task on a mutex.
///
/// The first poll links a slot at the back of the queue, unless the lock
/// word shows the mutex already unlocked, in which case it completes
/// immediately with [`Wakeup::Resumed`]. The check happens under the
/// spinlock and unlock clears the flag before taking it, so an unlock can
/// never slip between the check and the link.
///
/// Dropping the future frees its slot. A slot dropped after being
/// notified passes the wakeup on to the next waiter.
pub(crate) struct Wait<'a> {
    word: &'a LockWord,
    queue: &'a spin::Mutex<WaitQueue>,

    /// Key of the owned slot, once linked.
    key: Option<usize>,

    deadline: Option<Instant>,

    /// Timer for `deadline`, created on first suspension.
    timer: Option<Sleep>,
}

impl<'a> Wait<'a> {
    pub(crate) fn new(
        word: &'a LockWord,
        queue: &'a spin::Mutex<WaitQueue>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            word,
            queue,
            key: None,
            deadline,
            timer: None,
        }
    }

    fn poll_deadline(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(deadline) = self.deadline else {
            return Poll::Pending;
        };

        let timer = self.timer.get_or_insert_with(|| Sleep::until(deadline));
        Pin::new(timer).poll(cx)
    }
}

impl Future for Wait<'_> {
    type Output = Wakeup;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Wakeup> {
        let this = self.get_mut();

        match this.key {
            None => {
                let mut queue = this.queue.lock();

                if !this.word.load().is_locked() {
                    return Poll::Ready(Wakeup::Resumed);
                }

                this.key = Some(queue.push_back(Waiter::current(cx.waker())));
            }
            Some(key) => {
                let mut queue = this.queue.lock();

                if queue.is_notified(key) {
                    queue.release(key);
                    this.key = None;
                    return Poll::Ready(Wakeup::Resumed);
                }

                queue.update_waker(key, cx.waker());
            }
        }

        // The spinlock is released here: registering the timer talks to
        // another thread.
        if this.poll_deadline(cx).is_pending() {
            return Poll::Pending;
        }

        let Some(key) = this.key.take() else {
            return Poll::Ready(Wakeup::TimedOut);
        };

        // A wakeup that raced with the deadline wins.
        if this.queue.lock().release(key) {
            Poll::Ready(Wakeup::Resumed)
        } else {
            Poll::Ready(Wakeup::TimedOut)
        }
    }
}

impl Drop for Wait<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        let next = {
            let mut queue = self.queue.lock();
            if queue.release(key) {
                queue.notify_one()
            } else {
                None
            }
        };

        if let Some(waker) = next {
            log::trace!("cancelled waiter passes its wakeup on");
            waker.wake();
        }
    }
}
