#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A fixed-unit buffer pool: one pre-allocated arena of equally sized byte units, shared by a
//! tree of named branches, for handing buffers between producers and consumers without
//! allocating on every operation.
//!
//! The root of a tree is a [`UnitPool`] created with [`UnitPool::new()`] or
//! [`UnitPool::builder()`]. It allocates `unit_amount` units of `unit_length` bytes up front.
//! Any node can create branches with [`UnitPool::branch()`]; every node of the tree draws
//! units from the same free list but keeps its own queue of written, unread units.
//!
//! # Key Features
//!
//! - **No per-operation allocation**: reads and writes only move units between queues
//! - **Tree-wide backpressure**: writers wait when every unit of the arena is in flight
//! - **Per-node backpressure**: writers wait when their node holds as many unread units as
//!   it is configured for
//! - **Isolation**: data written to one node is only ever read from that same node, in order
//! - **Cascading close**: closing a node closes its branches and reclaims their unread units
//! - **Deadlines**: bounded variants of every blocking operation
//! - **Narrow capabilities**: [`Reader`], [`Writer`], [`Closer`] and their combinations let
//!   code depend on exactly what it uses
//! - **`std::io` integration**: [`UnitPool`] implements [`std::io::Read`] and
//!   [`std::io::Write`]
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//!
//! use unit_pool::UnitPool;
//!
//! let root = UnitPool::new(8, 4)?;
//! let frames = root.branch("frames", 2)?;
//!
//! let producer = thread::spawn({
//!     let frames = frames.clone();
//!     move || {
//!         for frame in [b"frame-01", b"frame-02", b"frame-03"] {
//!             frames.write(frame).unwrap();
//!         }
//!     }
//! });
//!
//! let mut buf = [0_u8; 8];
//! for expected in [b"frame-01", b"frame-02", b"frame-03"] {
//!     let len = frames.read(&mut buf)?;
//!     assert_eq!(&buf[..len], expected);
//! }
//!
//! producer.join().unwrap();
//! root.close()?;
//! # Ok::<(), unit_pool::Error>(())
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `debug` for pool, branch and close lifecycle events and
//! `trace` for every unit handed between a writer and a reader. Install a subscriber in the
//! application to see them.

mod arena;
mod builder;
mod capabilities;
mod constants;
mod error;
mod pool;
mod std_io;
mod storage;
mod unit_queue;

pub(crate) use arena::*;
pub use builder::*;
pub use capabilities::*;
pub(crate) use constants::*;
pub use error::*;
pub use pool::UnitPool;
pub(crate) use storage::*;
pub(crate) use unit_queue::*;
