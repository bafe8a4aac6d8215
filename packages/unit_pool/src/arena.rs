use std::cell::UnsafeCell;
use std::fmt;
use std::iter;
use std::ops::Range;

use crate::{Error, Result};

/// One contiguous allocation partitioned into `unit_amount` slots of `unit_length` bytes.
///
/// The arena does not know which slots are in use. Access to a slot is granted through a
/// [`Unit`], of which exactly one exists per slot. A `Unit` is minted only by [`Arena::new()`]
/// and is neither `Clone` nor `Copy`, so holding `&mut Unit` proves exclusive access to the
/// bytes of that slot and holding `&Unit` proves that nobody is writing them.
///
/// Units must only ever be used with the arena that minted them. Within this crate that holds
/// because an arena and every unit it minted travel together inside one `Storage`.
pub(crate) struct Arena {
    bytes: Box<[UnsafeCell<u8>]>,
    unit_length: usize,
}

// SAFETY: The only interior mutation happens through `fill()`, which requires `&mut Unit`.
// Units are unique per slot, so no two threads can touch the same bytes while one of them
// is writing. Slots of different units never overlap.
unsafe impl Sync for Arena {}

/// Exclusive claim on one slot of an [`Arena`], plus the number of bytes last written into it.
#[derive(Debug)]
pub(crate) struct Unit {
    index: usize,
    filled: usize,
}

impl Unit {
    /// Number of meaningful bytes in the slot, as set by the last `fill()`.
    #[cfg(test)]
    pub(crate) fn filled(&self) -> usize {
        self.filled
    }
}

impl Arena {
    /// Allocates the arena and returns it together with one [`Unit`] per slot, in slot order.
    pub(crate) fn new(unit_length: usize, unit_amount: usize) -> Result<(Self, Vec<Unit>)> {
        if unit_length == 0 {
            return Err(Error::InvalidCapacity {
                problem: "unit length must be greater than zero",
            });
        }

        if unit_amount == 0 {
            return Err(Error::InvalidCapacity {
                problem: "unit amount must be greater than zero",
            });
        }

        let total = unit_length
            .checked_mul(unit_amount)
            .ok_or(Error::InvalidCapacity {
                problem: "pool storage size overflows the address space",
            })?;

        let bytes = iter::repeat_with(|| UnsafeCell::new(0_u8))
            .take(total)
            .collect::<Box<[_]>>();

        let units = (0..unit_amount)
            .map(|index| Unit { index, filled: 0 })
            .collect();

        Ok((Self { bytes, unit_length }, units))
    }

    #[must_use]
    pub(crate) fn unit_length(&self) -> usize {
        self.unit_length
    }

    fn range_of(&self, unit: &Unit) -> Range<usize> {
        // Cannot overflow: the product of (index + 1) and unit_length is at most the total
        // size, which was validated in the constructor.
        let start = unit.index.wrapping_mul(self.unit_length);
        start..start.wrapping_add(self.unit_length)
    }

    fn cells(&self, unit: &Unit) -> &[UnsafeCell<u8>] {
        self.bytes
            .get(self.range_of(unit))
            .expect("a unit is only ever used with the arena that minted it")
    }

    /// Copies as much of `data` as fits into the slot and returns the number of bytes copied.
    /// Anything beyond the unit length is dropped.
    pub(crate) fn fill(&self, unit: &mut Unit, data: &[u8]) -> usize {
        let cells = self.cells(unit);

        // SAFETY: `UnsafeCell<u8>` has the same layout as `u8` and the cells are contiguous.
        // We hold `&mut Unit`, which is the only claim on these bytes, so creating an exclusive
        // slice over them cannot alias any other live reference.
        let slot = unsafe {
            std::slice::from_raw_parts_mut(UnsafeCell::raw_get(cells.as_ptr()), cells.len())
        };

        let copied = data.len().min(slot.len());
        let (target, _) = slot.split_at_mut(copied);
        let (source, _) = data.split_at(copied);
        target.copy_from_slice(source);

        unit.filled = copied;
        copied
    }

    /// Copies the filled prefix of the slot into `buf`, as much as fits, and returns the
    /// number of bytes copied.
    pub(crate) fn copy_out(&self, unit: &Unit, buf: &mut [u8]) -> usize {
        let cells = self.cells(unit);

        // SAFETY: Same layout argument as in `fill()`. We hold `&Unit`, and writing requires
        // `&mut Unit`, so nobody can be mutating these bytes while the shared slice lives.
        let slot = unsafe {
            std::slice::from_raw_parts(UnsafeCell::raw_get(cells.as_ptr()).cast_const(), cells.len())
        };

        let copied = unit.filled.min(buf.len());
        let (target, _) = buf.split_at_mut(copied);
        let (source, _) = slot.split_at(copied);
        target.copy_from_slice(source);

        copied
    }
}

impl fmt::Debug for Arena {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only, not worth asserting on.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("unit_length", &self.unit_length)
            .field("total_bytes", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Arena: Send, Sync);
    assert_impl_all!(Unit: Send, Sync);
    assert_not_impl_any!(Unit: Clone, Copy);

    #[test]
    fn mints_one_unit_per_slot() {
        let (arena, units) = Arena::new(4, 3).unwrap();

        assert_eq!(arena.unit_length(), 4);
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|unit| unit.filled() == 0));
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(matches!(
            Arena::new(0, 3),
            Err(Error::InvalidCapacity { .. })
        ));
        assert!(matches!(
            Arena::new(3, 0),
            Err(Error::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn rejects_overflowing_size() {
        assert!(matches!(
            Arena::new(usize::MAX, 2),
            Err(Error::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn fill_truncates_to_unit_length() {
        let (arena, mut units) = Arena::new(4, 1).unwrap();
        let mut unit = units.pop().unwrap();

        assert_eq!(arena.fill(&mut unit, b"abcdef"), 4);
        assert_eq!(unit.filled(), 4);

        let mut out = [0_u8; 8];
        assert_eq!(arena.copy_out(&unit, &mut out), 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn copy_out_respects_short_buffer() {
        let (arena, mut units) = Arena::new(4, 1).unwrap();
        let mut unit = units.pop().unwrap();
        arena.fill(&mut unit, b"wxyz");

        let mut out = [0_u8; 2];
        assert_eq!(arena.copy_out(&unit, &mut out), 2);
        assert_eq!(&out, b"wx");
    }

    #[test]
    fn slots_do_not_overlap() {
        let (arena, mut units) = Arena::new(2, 3).unwrap();

        for (unit, data) in units.iter_mut().zip([b"aa", b"bb", b"cc"]) {
            arena.fill(unit, data);
        }

        let mut out = [0_u8; 2];
        for (unit, expected) in units.iter().zip([b"aa", b"bb", b"cc"]) {
            arena.copy_out(unit, &mut out);
            assert_eq!(&out, expected);
        }
    }

    #[test]
    fn refill_replaces_previous_length() {
        let (arena, mut units) = Arena::new(4, 1).unwrap();
        let mut unit = units.pop().unwrap();

        arena.fill(&mut unit, b"abcd");
        arena.fill(&mut unit, b"z");

        let mut out = [0_u8; 4];
        assert_eq!(arena.copy_out(&unit, &mut out), 1);
        assert_eq!(out[0], b'z');
    }
}
