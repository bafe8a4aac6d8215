use std::sync::atomic::AtomicBool;
use std::time::Instant;

use crate::{Arena, Result, Unit, UnitQueue};

/// The arena of a pool tree together with the free list of its units.
///
/// One instance exists per root and is shared by every node descending from that root. The
/// memory is released when the last node referencing it is dropped; closing the root only
/// retires the free list so that no more units can be acquired.
#[derive(Debug)]
pub(crate) struct Storage {
    arena: Arena,
    free: UnitQueue<Unit>,
    unit_amount: usize,
}

impl Storage {
    pub(crate) fn new(unit_length: usize, unit_amount: usize) -> Result<Self> {
        let (arena, units) = Arena::new(unit_length, unit_amount)?;

        Ok(Self {
            arena,
            free: UnitQueue::with_items(unit_amount, units),
            unit_amount,
        })
    }

    #[must_use]
    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Total number of units in the arena.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn unit_amount(&self) -> usize {
        self.unit_amount
    }

    /// Number of units currently sitting in the free list.
    #[must_use]
    pub(crate) fn free_units(&self) -> usize {
        self.free.len()
    }

    /// Takes a unit from the free list, waiting until one is returned if all are in use.
    ///
    /// Gives up with [`Error::PoolClosed`][crate::Error::PoolClosed] once `closed` is set, as
    /// long as whoever sets it calls [`wake_acquirers()`][Self::wake_acquirers] afterwards.
    pub(crate) fn acquire(
        &self,
        deadline: Option<Instant>,
        closed: &AtomicBool,
    ) -> Result<Unit> {
        Ok(self.free.pop_unless(deadline, closed)?)
    }

    /// Makes everyone waiting in `acquire()` re-check whether they should give up.
    pub(crate) fn wake_acquirers(&self) {
        self.free.wake_all();
    }

    /// Returns a unit to the free list.
    pub(crate) fn release(&self, unit: Unit) {
        // The free list has room for every unit in the arena, so this never waits. The only
        // way it can be rejected is if the storage was retired, in which case nobody will ever
        // acquire the unit again and it can simply be forgotten.
        if self.free.push(unit, None).is_err() {
            tracing::trace!("unit returned after storage was retired");
        }
    }

    /// Returns a batch of units to the free list.
    pub(crate) fn release_all(&self, units: impl IntoIterator<Item = Unit>) {
        for unit in units {
            self.release(unit);
        }
    }

    /// Stops handing out units. Anyone waiting in `acquire()` observes the pool as closed.
    pub(crate) fn retire(&self) {
        let reclaimed = self.free.close().len();
        tracing::debug!(reclaimed, unit_amount = self.unit_amount, "storage retired");
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn is_retired(&self) -> bool {
        self.free.is_closed()
    }
}
