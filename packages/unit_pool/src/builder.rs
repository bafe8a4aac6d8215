use std::cell::Cell;
use std::marker::PhantomData;

use crate::{DEFAULT_ROOT_NAME, Error, Result, UnitPool};

/// Builder for creating the root of a [`UnitPool`] tree.
///
/// The unit length and unit amount are mandatory, the name is optional and defaults to
/// `root`. The arena is allocated by [`build()`][Self::build], never before.
///
/// # Examples
///
/// ```
/// use unit_pool::UnitPool;
///
/// let pool = UnitPool::builder().unit_length(64).unit_amount(32).build()?;
/// assert_eq!(pool.name(), "root");
/// # Ok::<(), unit_pool::Error>(())
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct UnitPoolBuilder {
    name: String,
    unit_length: Option<usize>,
    unit_amount: Option<usize>,

    _not_sync: PhantomData<Cell<()>>,
}

impl UnitPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_ROOT_NAME.to_string(),
            unit_length: None,
            unit_amount: None,
            _not_sync: PhantomData,
        }
    }

    /// Sets the name of the root pool.
    #[inline]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the size in bytes of each unit. Writes longer than this are truncated.
    #[inline]
    pub fn unit_length(mut self, unit_length: usize) -> Self {
        self.unit_length = Some(unit_length);
        self
    }

    /// Sets how many units the arena holds. This caps the number of units in flight across
    /// the whole tree and the unit amount any branch may ask for.
    #[inline]
    pub fn unit_amount(mut self, unit_amount: usize) -> Self {
        self.unit_amount = Some(unit_amount);
        self
    }

    /// Allocates the arena and returns the root of the new pool tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if the unit length or unit amount was not set, is
    /// zero, or describes an arena that does not fit in memory.
    pub fn build(self) -> Result<UnitPool> {
        let unit_length = self.unit_length.ok_or(Error::InvalidCapacity {
            problem: "unit length must be set before building the pool",
        })?;

        let unit_amount = self.unit_amount.ok_or(Error::InvalidCapacity {
            problem: "unit amount must be set before building the pool",
        })?;

        UnitPool::new_root(self.name, unit_length, unit_amount)
    }
}
