#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests that exercise blocking pool operations.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a call must stay blocked before we believe it is actually waiting on something.
pub const BLOCKED_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Runs a test with a timeout to prevent infinite hangs.
///
/// Tests of blocking operations deadlock instead of failing when they go wrong. This wraps the
/// test closure so that a hang turns into a panic after 10 seconds (60 under Miri, where thread
/// synchronization primitives are significantly slower).
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so mutation testing can detect hangs itself.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    let call = BlockingCall::spawn(test_fn);

    match call.wait(timeout) {
        Some(result) => result,
        None => panic!("test exceeded {timeout:?} timeout"),
    }
}

/// A call running on a background thread that the test expects to block for a while.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
///
/// use testing::BlockingCall;
///
/// let (tx, rx) = mpsc::channel::<u32>();
/// let call = BlockingCall::spawn(move || rx.recv().unwrap());
///
/// call.assert_blocked();
/// tx.send(5).unwrap();
/// assert_eq!(call.join(), 5);
/// ```
#[derive(Debug)]
pub struct BlockingCall<R> {
    result: mpsc::Receiver<R>,
    handle: thread::JoinHandle<()>,
}

impl<R> BlockingCall<R>
where
    R: Send + 'static,
{
    /// Starts `f` on a new thread.
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            // If this fails, the receiver has given up on us, which is fine.
            drop(tx.send(f()));
        });

        Self { result: rx, handle }
    }

    /// Asserts that the call has not completed within [`BLOCKED_GRACE_PERIOD`].
    ///
    /// # Panics
    ///
    /// Panics if the call completes (or panics) within the grace period.
    pub fn assert_blocked(&self) {
        match self.result.recv_timeout(BLOCKED_GRACE_PERIOD) {
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Ok(_) => panic!("call completed but was expected to block"),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                panic!("call panicked but was expected to block")
            }
        }
    }

    /// Waits up to `timeout` for the call to complete and returns its result, or `None` if it
    /// is still running.
    ///
    /// A panic in the call is propagated to the caller.
    #[must_use]
    pub fn wait(self, timeout: Duration) -> Option<R> {
        match self.result.recv_timeout(timeout) {
            Ok(result) => {
                self.handle.join().expect("call thread completed without panicking");
                Some(result)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => match self.handle.join() {
                Ok(()) => panic!("call thread disconnected unexpectedly"),
                Err(e) => std::panic::resume_unwind(e),
            },
        }
    }

    /// Waits for the call to complete and returns its result.
    ///
    /// # Panics
    ///
    /// Panics if the call panicked.
    pub fn join(self) -> R {
        let result = self.result.recv();

        match self.handle.join() {
            Ok(()) => result.expect("call thread sends its result before exiting"),
            Err(e) => std::panic::resume_unwind(e),
        }
    }
}
