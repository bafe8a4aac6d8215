//! Narrow capability traits over a pool node.
//!
//! Code that only consumes data can depend on [`Reader`], code that only produces data on
//! [`Writer`], and so on. The composite traits are implemented automatically for every type
//! that implements their parts.

use crate::{Result, UnitPool};

/// Capability shared by every pool handle: creating branches.
pub trait General {
    /// Creates a branch under `name` that may hold up to `unit_amount` unread units.
    ///
    /// # Errors
    ///
    /// See [`UnitPool::branch()`].
    fn branch(&self, name: &str, unit_amount: usize) -> Result<UnitPool>;
}

/// Capability to read units from a pool.
pub trait Reader: General {
    /// Copies the oldest unread unit into `buf` and returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// See [`UnitPool::read()`].
    fn read(&self, buf: &mut [u8]) -> Result<usize>;
}

/// Capability to write units to a pool.
pub trait Writer: General {
    /// Stores `data` in a unit, truncated to the unit length, and returns the bytes stored.
    ///
    /// # Errors
    ///
    /// See [`UnitPool::write()`].
    fn write(&self, data: &[u8]) -> Result<usize>;
}

/// Capability to close a pool.
pub trait Closer: General {
    /// Closes the pool and everything below it.
    ///
    /// # Errors
    ///
    /// See [`UnitPool::close()`].
    fn close(&self) -> Result<()>;
}

/// Groups [`Reader`] and [`Writer`].
pub trait ReadWriter: Reader + Writer {}

/// Groups [`Reader`] and [`Closer`].
pub trait ReadCloser: Reader + Closer {}

/// Groups [`Writer`] and [`Closer`].
pub trait WriteCloser: Writer + Closer {}

/// Groups [`Reader`], [`Writer`] and [`Closer`].
pub trait ReadWriteCloser: Reader + Writer + Closer {}

impl<T: Reader + Writer + ?Sized> ReadWriter for T {}
impl<T: Reader + Closer + ?Sized> ReadCloser for T {}
impl<T: Writer + Closer + ?Sized> WriteCloser for T {}
impl<T: Reader + Writer + Closer + ?Sized> ReadWriteCloser for T {}

impl General for UnitPool {
    #[inline]
    fn branch(&self, name: &str, unit_amount: usize) -> Result<UnitPool> {
        Self::branch(self, name, unit_amount)
    }
}

impl Reader for UnitPool {
    #[inline]
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Self::read(self, buf)
    }
}

impl Writer for UnitPool {
    #[inline]
    fn write(&self, data: &[u8]) -> Result<usize> {
        Self::write(self, data)
    }
}

impl Closer for UnitPool {
    #[inline]
    fn close(&self) -> Result<()> {
        Self::close(self)
    }
}
