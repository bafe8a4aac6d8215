// A poisoned lock means the process is in an unrecoverable/unsafe state and must exit (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because we can no longer ensure that the unit accounting of the pool is intact";

/// Name given to the root of a pool tree unless the builder says otherwise.
pub(crate) const DEFAULT_ROOT_NAME: &str = "root";
