use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use foldhash::{HashMap, HashMapExt};

use crate::{ERR_POISONED_LOCK, Error, Result, Storage, Unit, UnitPoolBuilder, UnitQueue};

/// A node in a tree of pools that share one arena of equally sized byte units.
///
/// The root of the tree is created with [`UnitPool::new()`] or [`UnitPool::builder()`], which
/// allocates the arena up front. Every node of the tree, the root included, can create named
/// branches via [`branch()`][Self::branch]. All nodes draw units from the same shared free
/// list, so the total number of units in flight across the whole tree never exceeds the unit
/// amount of the root.
///
/// # Data flow
///
/// * [`write()`][Self::write] takes a free unit (waiting if none is free anywhere in the
///   tree), copies the data into it and appends it to this node's own pending queue (waiting
///   if this node already holds as many unread units as it is configured for).
/// * [`read()`][Self::read] takes the oldest unit from this node's pending queue (waiting if
///   there is none), copies its bytes out and returns the unit to the shared free list.
///
/// Units are delivered to readers in the order they were written to the same node. Nodes never
/// see each other's data.
///
/// Writes longer than the unit length are truncated. This is a fixed record size contract,
/// so truncation is not an error; the returned byte count tells how much was stored.
///
/// # Closing
///
/// [`close()`][Self::close] closes the node and all its branches, returns every unread unit to
/// the free list and detaches the node from its parent. Closing the root additionally retires
/// the free list, after which no node of the tree can acquire units anymore.
///
/// # Thread safety
///
/// `UnitPool` is a cheaply cloneable handle. All clones refer to the same node and every
/// operation takes `&self`, so a node can be shared freely between threads.
///
/// # Example
///
/// ```
/// use unit_pool::UnitPool;
///
/// let root = UnitPool::new(4, 8)?;
/// let branch = root.branch("metrics", 2)?;
///
/// assert_eq!(branch.write(b"ping")?, 4);
///
/// let mut buf = [0_u8; 4];
/// assert_eq!(branch.read(&mut buf)?, 4);
/// assert_eq!(&buf, b"ping");
///
/// root.close()?;
/// assert!(branch.is_closed());
/// # Ok::<(), unit_pool::Error>(())
/// ```
#[derive(Clone)]
pub struct UnitPool {
    node: Arc<Node>,
}

#[derive(Debug)]
struct Node {
    name: String,

    /// `None` for the root. The parent owns us through its branch mapping, so we only hold
    /// a weak reference back to it.
    parent: Option<Weak<Self>>,

    /// How many unread units this node may hold. For the root, also the size of the arena.
    unit_amount: usize,

    storage: Arc<Storage>,

    /// Units that were written to this node but not yet read, oldest first.
    pending: UnitQueue<Unit>,

    /// Only ever set while holding the lock of `state`, but read without it by writers that
    /// wait for a free unit.
    closed: AtomicBool,

    state: Mutex<NodeState>,
}

#[derive(Debug)]
struct NodeState {
    branches: HashMap<String, Arc<Node>>,

    /// Open branches whose name has since been given to a newer branch. They are no longer
    /// found by name but are still closed along with this node.
    replaced: Vec<Arc<Node>>,
}

impl UnitPool {
    /// Creates the root of a new pool tree with `unit_amount` units of `unit_length` bytes.
    ///
    /// The whole arena is allocated here; no further allocation happens when reading or
    /// writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if either value is zero or the arena size does not
    /// fit in memory.
    ///
    /// # Example
    ///
    /// ```
    /// use unit_pool::UnitPool;
    ///
    /// let pool = UnitPool::new(1024, 16)?;
    /// assert_eq!(pool.unit_length(), 1024);
    /// assert_eq!(pool.free_units(), 16);
    /// # Ok::<(), unit_pool::Error>(())
    /// ```
    pub fn new(unit_length: usize, unit_amount: usize) -> Result<Self> {
        Self::builder()
            .unit_length(unit_length)
            .unit_amount(unit_amount)
            .build()
    }

    /// Starts building the root of a new pool tree.
    ///
    /// # Example
    ///
    /// ```
    /// use unit_pool::UnitPool;
    ///
    /// let pool = UnitPool::builder()
    ///     .name("frames")
    ///     .unit_length(512)
    ///     .unit_amount(4)
    ///     .build()?;
    /// assert_eq!(pool.name(), "frames");
    /// # Ok::<(), unit_pool::Error>(())
    /// ```
    #[inline]
    pub fn builder() -> UnitPoolBuilder {
        UnitPoolBuilder::new()
    }

    pub(crate) fn new_root(name: String, unit_length: usize, unit_amount: usize) -> Result<Self> {
        let storage = Arc::new(Storage::new(unit_length, unit_amount)?);

        tracing::debug!(pool = %name, unit_length, unit_amount, "pool created");

        Ok(Self {
            node: Arc::new(Node::new(name, None, unit_amount, storage)),
        })
    }

    /// Creates a branch of this pool under the given name and returns it.
    ///
    /// The branch shares the free list of the whole tree but has its own pending queue that
    /// holds at most `unit_amount` unread units. With a `unit_amount` of zero the branch holds
    /// no unread units at all: every write waits until a reader takes the unit.
    ///
    /// If this pool already has a branch with the same name, the new branch takes its place
    /// in lookups. The old branch stays open for anyone holding a handle to it and is still
    /// closed when this pool is closed.
    ///
    /// Branch capacity is checked against the configured unit amount of this pool, not against
    /// how many units are free right now. Sibling branches may together be configured for more
    /// units than exist, in which case they compete for the shared free list.
    ///
    /// # Errors
    ///
    /// * [`Error::PoolClosed`] if this pool has been closed. This is checked first.
    /// * [`Error::CapacityExceedsParent`] if `unit_amount` is greater than the unit amount
    ///   this pool is configured for.
    ///
    /// # Example
    ///
    /// ```
    /// use unit_pool::{Error, UnitPool};
    ///
    /// let root = UnitPool::new(16, 4)?;
    ///
    /// let audio = root.branch("audio", 4)?;
    /// assert_eq!(audio.unit_amount(), 4);
    ///
    /// assert!(matches!(
    ///     root.branch("video", 5),
    ///     Err(Error::CapacityExceedsParent { .. })
    /// ));
    /// # Ok::<(), unit_pool::Error>(())
    /// ```
    pub fn branch(&self, name: impl Into<String>, unit_amount: usize) -> Result<Self> {
        let mut state = self.node.lock_state();

        if self.node.is_closed() {
            return Err(Error::PoolClosed);
        }

        if unit_amount > self.node.unit_amount {
            return Err(Error::CapacityExceedsParent {
                requested: unit_amount,
                parent: self.node.unit_amount,
            });
        }

        let name = name.into();

        let branch = Arc::new(Node::new(
            name.clone(),
            Some(Arc::downgrade(&self.node)),
            unit_amount,
            Arc::clone(&self.node.storage),
        ));

        tracing::debug!(pool = %self.node.name, branch = %name, unit_amount, "branch created");

        if let Some(replaced) = state.branches.insert(name, Arc::clone(&branch)) {
            tracing::debug!(pool = %self.node.name, branch = %replaced.name, "branch replaced");

            state.replaced.push(replaced);
        }

        Ok(Self { node: branch })
    }

    /// Copies `data` into a unit and queues it for readers of this pool.
    ///
    /// At most [`unit_length()`][Self::unit_length] bytes are stored; anything beyond that is
    /// silently dropped. Returns the number of bytes stored.
    ///
    /// Waits if no unit is free anywhere in the tree, or if this pool already holds as many
    /// unread units as it is configured for. On a pool configured for zero units, waits until
    /// a reader takes the unit. Use [`write_timeout()`][Self::write_timeout] or
    /// [`write_until()`][Self::write_until] to bound the wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if this pool is closed, or becomes closed while waiting.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.write_inner(data, None)
    }

    /// Like [`write()`][Self::write] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`write()`][Self::write], returns
    /// [`Error::DeadlineExceeded`] if the write could not complete in time. Nothing is
    /// queued in that case.
    pub fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        self.write_inner(data, deadline_after(timeout))
    }

    /// Like [`write()`][Self::write] but gives up once `deadline` passes.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`write()`][Self::write], returns
    /// [`Error::DeadlineExceeded`] if the write could not complete in time. Nothing is
    /// queued in that case.
    pub fn write_until(&self, data: &[u8], deadline: Instant) -> Result<usize> {
        self.write_inner(data, Some(deadline))
    }

    fn write_inner(&self, data: &[u8], deadline: Option<Instant>) -> Result<usize> {
        if self.node.is_closed() {
            return Err(Error::PoolClosed);
        }

        let storage = &self.node.storage;

        let mut unit = storage.acquire(deadline, &self.node.closed)?;
        let written = storage.arena().fill(&mut unit, data);

        // The pending queue is closed atomically with the node, so a concurrent close either
        // sees this unit in the queue and reclaims it, or rejects it here and we reclaim it.
        if let Err(rejected) = self.node.pending.push(unit, deadline) {
            storage.release(rejected.item);
            return Err(rejected.reason.into());
        }

        tracing::trace!(pool = %self.node.name, written, "unit written");

        Ok(written)
    }

    /// Takes the oldest unread unit of this pool, copies its bytes into `buf` and returns the
    /// number of bytes copied.
    ///
    /// If `buf` is shorter than the data in the unit, the rest of the unit is discarded. The
    /// unit goes back to the free list of the tree either way.
    ///
    /// Waits until a unit is available. Use [`read_timeout()`][Self::read_timeout] or
    /// [`read_until()`][Self::read_until] to bound the wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] once this pool is closed, including when it is closed
    /// while waiting.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_inner(buf, None)
    }

    /// Like [`read()`][Self::read] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`read()`][Self::read], returns
    /// [`Error::DeadlineExceeded`] if no unit arrived in time.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.read_inner(buf, deadline_after(timeout))
    }

    /// Like [`read()`][Self::read] but gives up once `deadline` passes.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`read()`][Self::read], returns
    /// [`Error::DeadlineExceeded`] if no unit arrived in time.
    pub fn read_until(&self, buf: &mut [u8], deadline: Instant) -> Result<usize> {
        self.read_inner(buf, Some(deadline))
    }

    fn read_inner(&self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize> {
        let storage = &self.node.storage;

        let unit = self.node.pending.pop(deadline)?;
        let read = storage.arena().copy_out(&unit, buf);
        storage.release(unit);

        tracing::trace!(pool = %self.node.name, read, "unit read");

        Ok(read)
    }

    /// Closes this pool and, depth first, every branch below it.
    ///
    /// Unread units of every closed node go back to the free list and the node is removed from
    /// its parent. Readers waiting on a closed node wake up with [`Error::PoolClosed`].
    /// Closing the root also retires the free list of the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the pool was already closed, either directly or by a
    /// close of one of its ancestors.
    pub fn close(&self) -> Result<()> {
        // Lock order is always ancestor before descendant, here as well as in the cascade.
        let parent = self.node.parent.as_ref().and_then(Weak::upgrade);
        let mut parent_state = parent.as_deref().map(Node::lock_state);
        let mut state = self.node.lock_state();

        if self.node.is_closed() {
            return Err(Error::PoolClosed);
        }

        self.node.shut_down(&mut state);

        if let Some(parent_state) = parent_state.as_mut() {
            parent_state.detach(&self.node);
        }

        drop(state);
        drop(parent_state);

        if self.node.is_root() {
            self.node.storage.retire();
        }

        Ok(())
    }

    /// The name of this pool. The root is called `root` unless the builder named it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The size in bytes of every unit in the tree.
    #[must_use]
    pub fn unit_length(&self) -> usize {
        self.node.storage.arena().unit_length()
    }

    /// How many unread units this pool may hold. For the root, this is also the total number
    /// of units in the tree.
    #[must_use]
    pub fn unit_amount(&self) -> usize {
        self.node.unit_amount
    }

    /// Whether this pool has been closed, directly or by a close of one of its ancestors.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.node.is_closed()
    }

    /// Whether this pool is the root of its tree.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node.is_root()
    }

    /// How many units are free in the whole tree right now.
    ///
    /// Together with the pending units of every node and the units held by in-progress reads
    /// and writes, this always adds up to the unit amount of the root until the root closes.
    /// After the root closes, this is always zero.
    #[must_use]
    pub fn free_units(&self) -> usize {
        self.node.storage.free_units()
    }

    /// How many written units are waiting for a reader of this pool.
    #[must_use]
    pub fn pending_units(&self) -> usize {
        self.node.pending.len()
    }

    /// Names of the open branches directly below this pool, in sorted order.
    #[must_use]
    pub fn branch_names(&self) -> Vec<String> {
        let mut names = self
            .node
            .lock_state()
            .branches
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort_unstable();
        names
    }

    /// Looks up an open branch directly below this pool by name.
    #[must_use]
    pub fn get_branch(&self, name: &str) -> Option<Self> {
        self.node
            .lock_state()
            .branches
            .get(name)
            .map(|node| Self {
                node: Arc::clone(node),
            })
    }
}

impl fmt::Debug for UnitPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitPool")
            .field("name", &self.node.name)
            .field("unit_length", &self.unit_length())
            .field("unit_amount", &self.node.unit_amount)
            .field("pending_units", &self.pending_units())
            .field("free_units", &self.free_units())
            .finish_non_exhaustive()
    }
}

impl Node {
    fn new(
        name: String,
        parent: Option<Weak<Self>>,
        unit_amount: usize,
        storage: Arc<Storage>,
    ) -> Self {
        Self {
            name,
            parent,
            unit_amount,
            storage,
            pending: UnitQueue::new(unit_amount),
            closed: AtomicBool::new(false),
            state: Mutex::new(NodeState {
                branches: HashMap::new(),
                replaced: Vec::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().expect(ERR_POISONED_LOCK)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Closes every branch below this node, reclaims the unread units of this node and marks
    /// it closed. The caller holds the lock of this node and is responsible for detaching it
    /// from its parent.
    fn shut_down(&self, state: &mut NodeState) {
        let branches = state
            .branches
            .drain()
            .map(|(_, branch)| branch)
            .chain(state.replaced.drain(..));

        for branch in branches {
            let mut branch_state = branch.lock_state();

            // Closed branches detach themselves under our lock, so whatever we still hold
            // is open.
            debug_assert!(!branch.is_closed());

            branch.shut_down(&mut branch_state);
        }

        self.closed.store(true, Ordering::Release);

        // Writers of this node that wait for a free unit give up once they see the flag.
        self.storage.wake_acquirers();

        let stranded = self.pending.close();
        let reclaimed = stranded.len();
        self.storage.release_all(stranded);

        tracing::debug!(pool = %self.name, reclaimed, "pool closed");
    }
}

impl NodeState {
    /// Removes `child` from the branch mapping or, if the name has since been taken over by a
    /// different branch, from the replaced branches.
    fn detach(&mut self, child: &Arc<Node>) {
        if self
            .branches
            .get(&child.name)
            .is_some_and(|current| Arc::ptr_eq(current, child))
        {
            self.branches.remove(&child.name);
        } else {
            self.replaced.retain(|replaced| !Arc::ptr_eq(replaced, child));
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // A node that is dropped without being closed may still hold unread units. They would
        // be lost to the tree if we did not hand them back.
        let stranded = self.pending.close();

        if !stranded.is_empty() {
            tracing::debug!(
                pool = %self.name,
                reclaimed = stranded.len(),
                "unread units reclaimed from dropped pool"
            );
            self.storage.release_all(stranded);
        }
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    // A timeout too large to represent is as good as no timeout at all.
    Instant::now().checked_add(timeout)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(UnitPool: Send, Sync, Clone, fmt::Debug);

    #[test]
    fn new_root_has_every_unit_free() {
        let pool = UnitPool::new(8, 3).unwrap();

        assert_eq!(pool.name(), "root");
        assert!(pool.is_root());
        assert!(!pool.is_closed());
        assert_eq!(pool.unit_length(), 8);
        assert_eq!(pool.unit_amount(), 3);
        assert_eq!(pool.free_units(), 3);
        assert_eq!(pool.pending_units(), 0);
    }

    #[test]
    fn write_moves_unit_from_free_to_pending() {
        let pool = UnitPool::new(8, 3).unwrap();

        pool.write(b"abc").unwrap();

        assert_eq!(pool.free_units(), 2);
        assert_eq!(pool.pending_units(), 1);
    }

    #[test]
    fn read_moves_unit_from_pending_to_free() {
        let pool = UnitPool::new(8, 3).unwrap();
        pool.write(b"abc").unwrap();

        let mut buf = [0_u8; 8];
        assert_eq!(pool.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");

        assert_eq!(pool.free_units(), 3);
        assert_eq!(pool.pending_units(), 0);
    }

    #[test]
    fn read_into_short_buffer_discards_rest_of_unit() {
        let pool = UnitPool::new(8, 2).unwrap();
        pool.write(b"abcdefgh").unwrap();
        pool.write(b"next").unwrap();

        let mut short = [0_u8; 2];
        assert_eq!(pool.read(&mut short).unwrap(), 2);
        assert_eq!(&short, b"ab");

        let mut buf = [0_u8; 8];
        assert_eq!(pool.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"next");
    }

    #[test]
    fn empty_write_still_occupies_a_unit() {
        let pool = UnitPool::new(8, 2).unwrap();

        assert_eq!(pool.write(&[]).unwrap(), 0);
        assert_eq!(pool.pending_units(), 1);

        let mut buf = [0_u8; 8];
        assert_eq!(pool.read(&mut buf).unwrap(), 0);
        assert_eq!(pool.free_units(), 2);
    }

    #[test]
    fn branch_inherits_unit_length() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 2).unwrap();

        assert_eq!(branch.name(), "a");
        assert!(!branch.is_root());
        assert_eq!(branch.unit_length(), 16);
        assert_eq!(branch.unit_amount(), 2);
        assert_eq!(root.branch_names(), vec!["a".to_string()]);
    }

    #[test]
    fn branch_of_branch_is_checked_against_its_parent() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 2).unwrap();

        assert_eq!(
            branch.branch("b", 3).unwrap_err(),
            Error::CapacityExceedsParent {
                requested: 3,
                parent: 2
            }
        );
        assert!(branch.branch("b", 2).is_ok());
    }

    #[test]
    fn zero_unit_branch_hands_writes_to_a_waiting_reader() {
        testing::with_watchdog(|| {
            let root = UnitPool::new(16, 4).unwrap();
            let branch = root.branch("a", 0).unwrap();
            assert_eq!(branch.unit_amount(), 0);

            let writer = testing::BlockingCall::spawn({
                let branch = branch.clone();
                move || branch.write(b"direct")
            });
            writer.assert_blocked();

            let mut buf = [0_u8; 16];
            assert_eq!(branch.read(&mut buf).unwrap(), 6);
            assert_eq!(&buf[..6], b"direct");

            assert_eq!(writer.join().unwrap(), 6);
            assert_eq!(branch.pending_units(), 0);
            assert_eq!(root.free_units(), 4);
        });
    }

    #[test]
    fn zero_unit_branch_write_without_reader_returns_unit() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 0).unwrap();

        assert_eq!(
            branch
                .write_timeout(b"x", Duration::from_millis(20))
                .unwrap_err(),
            Error::DeadlineExceeded
        );
        assert_eq!(branch.pending_units(), 0);
        assert_eq!(root.free_units(), 4);
    }

    #[test]
    fn replaced_branch_stays_usable() {
        let root = UnitPool::new(16, 4).unwrap();
        let first = root.branch("a", 2).unwrap();
        first.write(b"keep").unwrap();

        let second = root.branch("a", 2).unwrap();

        assert!(!first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(root.branch_names(), vec!["a".to_string()]);
        assert_eq!(root.get_branch("a").unwrap().unit_amount(), 2);
        assert_eq!(root.free_units(), 3);

        let mut buf = [0_u8; 16];
        assert_eq!(first.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"keep");
        first.write(b"more").unwrap();

        // Closing the replaced branch must not detach its successor.
        first.close().unwrap();
        assert_eq!(root.free_units(), 4);
        assert!(Arc::ptr_eq(&root.get_branch("a").unwrap().node, &second.node));
    }

    #[test]
    fn closing_parent_closes_replaced_branches() {
        let root = UnitPool::new(16, 4).unwrap();
        let parent = root.branch("p", 4).unwrap();
        let first = parent.branch("a", 2).unwrap();
        let nested = first.branch("n", 1).unwrap();
        first.write(b"x").unwrap();
        nested.write(b"y").unwrap();

        let second = parent.branch("a", 2).unwrap();
        parent.close().unwrap();

        assert!(first.is_closed());
        assert!(nested.is_closed());
        assert!(second.is_closed());
        assert_eq!(root.free_units(), 4);
    }

    #[test]
    fn branching_a_closed_pool_reports_closed_before_capacity() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 2).unwrap();
        branch.close().unwrap();

        assert_eq!(branch.branch("b", 3).unwrap_err(), Error::PoolClosed);
        assert_eq!(branch.branch("b", 1).unwrap_err(), Error::PoolClosed);
    }

    #[test]
    fn close_wakes_own_writer_waiting_for_free_unit() {
        testing::with_watchdog(|| {
            let root = UnitPool::new(16, 1).unwrap();
            let branch = root.branch("a", 1).unwrap();
            root.write(b"hog").unwrap();

            let writer = testing::BlockingCall::spawn({
                let branch = branch.clone();
                move || branch.write(b"late")
            });
            writer.assert_blocked();

            branch.close().unwrap();

            assert_eq!(writer.join().unwrap_err(), Error::PoolClosed);
            assert_eq!(root.pending_units(), 1);
            assert_eq!(root.free_units(), 0);
            assert!(!root.is_closed());
        });
    }

    #[test]
    fn close_detaches_from_parent() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 2).unwrap();

        branch.close().unwrap();

        assert!(branch.is_closed());
        assert!(!root.is_closed());
        assert!(root.branch_names().is_empty());
        assert!(root.get_branch("a").is_none());
    }

    #[test]
    fn dropping_unclosed_branch_reclaims_its_units() {
        let root = UnitPool::new(16, 4).unwrap();
        let branch = root.branch("a", 2).unwrap();
        branch.write(b"x").unwrap();
        branch.write(b"y").unwrap();
        assert_eq!(root.free_units(), 2);

        // The parent mapping keeps the node alive until the root goes away.
        drop(branch);
        assert_eq!(root.free_units(), 2);

        let survivor = root.branch("b", 1).unwrap();
        drop(root);

        assert_eq!(survivor.free_units(), 4);
    }

    #[test]
    fn clones_refer_to_the_same_node() {
        let pool = UnitPool::new(8, 2).unwrap();
        let clone = pool.clone();

        pool.write(b"hi").unwrap();
        assert_eq!(clone.pending_units(), 1);

        clone.close().unwrap();
        assert!(pool.is_closed());
    }

    #[test]
    fn write_after_root_close_fails_on_detached_handles() {
        let root = UnitPool::new(8, 2).unwrap();
        let clone = root.clone();

        root.close().unwrap();

        assert_eq!(clone.write(b"x").unwrap_err(), Error::PoolClosed);
        assert_eq!(clone.free_units(), 0);
    }

    #[test]
    fn timeouts_report_deadline_exceeded() {
        let pool = UnitPool::new(8, 1).unwrap();

        let mut buf = [0_u8; 8];
        assert_eq!(
            pool.read_timeout(&mut buf, Duration::from_millis(10))
                .unwrap_err(),
            Error::DeadlineExceeded
        );

        pool.write(b"a").unwrap();
        assert_eq!(
            pool.write_timeout(b"b", Duration::from_millis(10))
                .unwrap_err(),
            Error::DeadlineExceeded
        );

        // The failed write did not strand anything.
        assert_eq!(pool.free_units(), 0);
        assert_eq!(pool.pending_units(), 1);
    }

    #[test]
    fn huge_timeout_behaves_like_no_timeout() {
        let pool = UnitPool::new(8, 1).unwrap();
        pool.write(b"a").unwrap();

        let mut buf = [0_u8; 8];
        assert_eq!(pool.read_timeout(&mut buf, Duration::MAX).unwrap(), 1);
    }

    #[test]
    fn debug_output_names_the_pool() {
        let pool = UnitPool::builder()
            .name("frames")
            .unit_length(8)
            .unit_amount(1)
            .build()
            .unwrap();

        let output = format!("{pool:?}");
        assert!(output.contains("frames"));
        assert!(output.contains("unit_length: 8"));
    }

    #[test]
    fn concurrent_branch_and_close_on_same_parent() {
        testing::with_watchdog(|| {
            let root = UnitPool::new(4, 8).unwrap();

            let workers = (0..4)
                .map(|worker| {
                    let root = root.clone();
                    thread::spawn(move || {
                        for round in 0..200 {
                            let name = format!("{}", (worker + round) % 3);
                            if let Ok(branch) = root.branch(name, 1) {
                                drop(branch.write(b"x"));
                                drop(branch.close());
                            }
                        }
                    })
                })
                .collect::<Vec<_>>();

            for worker in workers {
                worker.join().unwrap();
            }

            for name in root.branch_names() {
                root.get_branch(&name).unwrap().close().unwrap();
            }

            assert_eq!(root.free_units(), 8);
        });
    }
}
