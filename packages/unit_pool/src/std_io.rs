//! [`std::io`] adapters, so a pool node can be handed to code written against `Read`/`Write`.
//!
//! Each `io::Read::read()` call consumes one whole unit and each `io::Write::write()` call
//! fills one whole unit, exactly like the inherent methods. A closed node reads as end of
//! stream and fails writes with [`io::ErrorKind::BrokenPipe`].

use std::io;

use crate::{Error, UnitPool};

impl io::Read for &UnitPool {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // An empty buffer must not consume a unit.
        if buf.is_empty() {
            return Ok(0);
        }

        match UnitPool::read(*self, buf) {
            Ok(read) => Ok(read),
            Err(Error::PoolClosed) => Ok(0),
            Err(error) => Err(error.into()),
        }
    }
}

impl io::Read for UnitPool {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for &UnitPool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        Ok(UnitPool::write(*self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Written units are visible to readers as soon as `write()` returns.
        Ok(())
    }
}

impl io::Write for UnitPool {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut &*self)
    }
}
