use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use crate::{ERR_POISONED_LOCK, Error};

/// Bounded FIFO queue that blocks producers when full and consumers when empty.
///
/// Used both as the free list shared by a whole pool tree and as the pending queue of each
/// individual pool node. Once closed, the queue rejects every push and every pop; closing
/// hands back whatever was still queued so the caller can decide where it goes.
///
/// A queue with capacity zero buffers nothing: each push waits until a consumer has taken
/// the item, or hands the item back if that does not happen.
#[derive(Debug)]
pub(crate) struct UnitQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Signaled when an item is pushed or the queue is closed.
    not_empty: Condvar,

    /// Signaled when an item is popped or the queue is closed.
    not_full: Condvar,

    capacity: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,

    /// Number of successful pops, wrapping. A hand-off push compares it against the value
    /// seen when its item went in to learn whether a consumer took the item.
    pops: u64,
}

/// Why a queue operation gave up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum QueueError {
    Closed,
    DeadlineExceeded,
}

impl From<QueueError> for Error {
    fn from(value: QueueError) -> Self {
        match value {
            QueueError::Closed => Self::PoolClosed,
            QueueError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// A push that did not happen. The item is handed back so it is never lost.
#[derive(Debug)]
pub(crate) struct Rejected<T> {
    pub(crate) item: T,
    pub(crate) reason: QueueError,
}

impl<T> UnitQueue<T> {
    /// Creates an empty queue that holds at most `capacity` items.
    pub(crate) fn new(capacity: usize) -> Self {
        Self::with_items(capacity, Vec::new())
    }

    /// Creates a queue that initially holds `items`, oldest first.
    pub(crate) fn with_items(capacity: usize, items: Vec<T>) -> Self {
        assert!(
            items.len() <= capacity,
            "cannot seed a queue with more items than it can hold"
        );

        let mut queue = VecDeque::with_capacity(capacity.max(1));
        queue.extend(items);

        Self {
            state: Mutex::new(QueueState {
                items: queue,
                closed: false,
                pops: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().expect(ERR_POISONED_LOCK)
    }

    fn is_handoff(&self) -> bool {
        self.capacity == 0
    }

    /// Appends an item, waiting for room if the queue is full.
    ///
    /// With a deadline, gives up once the deadline passes and hands the item back.
    pub(crate) fn push(&self, item: T, deadline: Option<Instant>) -> Result<(), Rejected<T>> {
        // A hand-off queue still parks one item at a time while its pusher waits for a taker.
        let slots = self.capacity.max(1);
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(Rejected {
                    item,
                    reason: QueueError::Closed,
                });
            }

            if state.items.len() < slots {
                break;
            }

            let (next, expired) = wait(&self.not_full, state, deadline);
            state = next;

            if expired {
                return Err(Rejected {
                    item,
                    reason: QueueError::DeadlineExceeded,
                });
            }
        }

        state.items.push_back(item);
        let pops_before = state.pops;
        self.not_empty.notify_one();

        if self.is_handoff() {
            return self.await_taker(state, pops_before, deadline);
        }

        Ok(())
    }

    /// Waits until the single item parked in a hand-off queue has been popped.
    ///
    /// If the queue closes or the deadline passes first, the item is taken back out and
    /// returned to the caller.
    fn await_taker(
        &self,
        mut state: MutexGuard<'_, QueueState<T>>,
        pops_before: u64,
        deadline: Option<Instant>,
    ) -> Result<(), Rejected<T>> {
        loop {
            // Only one item is parked at a time, so the first pop after ours took ours.
            if state.pops != pops_before {
                return Ok(());
            }

            let reason = if state.closed {
                QueueError::Closed
            } else {
                let (next, expired) = wait(&self.not_full, state, deadline);
                state = next;

                if !expired {
                    continue;
                }

                QueueError::DeadlineExceeded
            };

            let Some(item) = state.items.pop_front() else {
                // Nothing parked means a consumer got it after all.
                return Ok(());
            };

            drop(state);

            // Others may be waiting for the slot we just vacated.
            self.not_full.notify_all();
            return Err(Rejected { item, reason });
        }
    }

    /// Removes the oldest item, waiting for one to arrive if the queue is empty.
    pub(crate) fn pop(&self, deadline: Option<Instant>) -> Result<T, QueueError> {
        self.pop_inner(deadline, None)
    }

    /// Like [`pop()`][Self::pop] but also gives up as soon as `abandon` is set.
    ///
    /// Whoever sets the flag must call [`wake_all()`][Self::wake_all] afterwards so that a
    /// consumer already waiting observes it.
    pub(crate) fn pop_unless(
        &self,
        deadline: Option<Instant>,
        abandon: &AtomicBool,
    ) -> Result<T, QueueError> {
        self.pop_inner(deadline, Some(abandon))
    }

    fn pop_inner(
        &self,
        deadline: Option<Instant>,
        abandon: Option<&AtomicBool>,
    ) -> Result<T, QueueError> {
        let mut state = self.lock();

        loop {
            if state.closed || abandon.is_some_and(|flag| flag.load(Ordering::Acquire)) {
                return Err(QueueError::Closed);
            }

            if let Some(item) = state.items.pop_front() {
                state.pops = state.pops.wrapping_add(1);
                drop(state);

                if self.is_handoff() {
                    // Both the pusher of this item and pushers waiting for the slot use this.
                    self.not_full.notify_all();
                } else {
                    self.not_full.notify_one();
                }

                return Ok(item);
            }

            let (next, expired) = wait(&self.not_empty, state, deadline);
            state = next;

            if expired {
                return Err(QueueError::DeadlineExceeded);
            }
        }
    }

    /// Wakes every waiting producer and consumer so they re-check their conditions.
    pub(crate) fn wake_all(&self) {
        // Taking the lock orders this after any waiter that checked its condition but has
        // not started waiting yet.
        drop(self.lock());

        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Closes the queue and returns the items that were still in it, oldest first.
    ///
    /// Everyone blocked in `push()` or `pop()` wakes up and observes the closure. Closing an
    /// already closed queue returns nothing. An item parked in a hand-off queue is not
    /// returned; its pusher is still waiting and takes it back.
    pub(crate) fn close(&self) -> Vec<T> {
        let mut state = self.lock();
        state.closed = true;

        let remaining = if self.is_handoff() {
            Vec::new()
        } else {
            state.items.drain(..).collect()
        };

        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();

        remaining
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Waits on `condvar` until notified or until the deadline passes.
///
/// Returns the guard and whether the deadline had already passed, in which case no waiting
/// took place. Spurious wakeups are fine, the callers re-check their condition in a loop.
fn wait<'a, T>(
    condvar: &Condvar,
    state: MutexGuard<'a, QueueState<T>>,
    deadline: Option<Instant>,
) -> (MutexGuard<'a, QueueState<T>>, bool) {
    let Some(deadline) = deadline else {
        return (condvar.wait(state).expect(ERR_POISONED_LOCK), false);
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return (state, true);
    }

    let (state, _) = condvar
        .wait_timeout(state, remaining)
        .expect(ERR_POISONED_LOCK);
    (state, false)
}
