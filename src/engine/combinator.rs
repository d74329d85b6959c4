use std::sync::{Arc, Mutex};

use crate::activity::lock;
use crate::engine::Next;

#[derive(Debug)]
struct Barrier {
    remaining: usize,
    canceled: bool,
    closed: bool,
}

/// What the barrier decided when the last signal arrived.
enum Close {
    Invoke,
    Cancel,
}

/// An N-ary fan-in barrier gating exactly one downstream node.
///
/// Every dependency reports to the combinator exactly once, either through
/// [`signal`](Self::signal) (it completed) or [`cancel`](Self::cancel) (it
/// was abandoned). A canceled dependency still counts toward closing the
/// barrier. When the countdown reaches zero the combinator closes and calls
/// [`Next::cancel`] if any dependency was canceled, [`Next::invoke`]
/// otherwise.
///
/// The countdown, the canceled flag and the closed flag live under a single
/// mutex, so the downstream node is reached exactly once no matter how the
/// signals interleave across threads. The downstream node itself is called
/// with the mutex released.
pub struct Combinator {
    next: Arc<dyn Next>,
    barrier: Mutex<Barrier>,
}

impl Combinator {
    pub fn new(next: Arc<dyn Next>, dependencies: usize) -> Arc<Self> {
        Arc::new(Self {
            next,
            barrier: Mutex::new(Barrier {
                remaining: dependencies,
                canceled: false,
                closed: false,
            }),
        })
    }

    /// Accepts one completion signal.
    ///
    /// # Panics
    /// Panics if the combinator already closed.
    pub fn signal(&self) {
        self.arrive(false);
    }

    /// Accepts one cancellation signal.
    ///
    /// # Panics
    /// Panics if the combinator already closed.
    pub fn cancel(&self) {
        self.arrive(true);
    }

    /// Declares one more dependency.
    ///
    /// # Panics
    /// Panics if the combinator already closed, since the downstream node has
    /// already been invoked or canceled.
    pub fn expect(&self) {
        let mut barrier = lock(&self.barrier);
        assert!(
            !barrier.closed,
            "dependency registered on the closed combinator of '{}'",
            self.next.name()
        );
        barrier.remaining += 1;
    }

    /// Closes a combinator that has no dependencies, invoking the downstream
    /// node.
    ///
    /// # Panics
    /// Panics if dependencies are still outstanding or the combinator already
    /// closed.
    pub fn open(&self) {
        {
            let mut barrier = lock(&self.barrier);
            assert!(
                !barrier.closed,
                "'{}' started more than once",
                self.next.name()
            );
            assert!(
                barrier.remaining == 0,
                "'{}' started with {} unresolved dependencies",
                self.next.name(),
                barrier.remaining
            );
            barrier.closed = true;
        }

        tracing::trace!(next = self.next.name(), "combinator opened");
        self.next.invoke();
    }

    /// Number of dependencies that have not reported yet.
    pub fn remaining(&self) -> usize {
        lock(&self.barrier).remaining
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.barrier).closed
    }

    fn arrive(&self, canceled: bool) {
        let close = {
            let mut barrier = lock(&self.barrier);
            assert!(
                !barrier.closed && barrier.remaining > 0,
                "signal delivered to the closed combinator of '{}'",
                self.next.name()
            );

            barrier.canceled |= canceled;
            barrier.remaining -= 1;

            if barrier.remaining > 0 {
                return;
            }

            barrier.closed = true;
            if barrier.canceled {
                Close::Cancel
            } else {
                Close::Invoke
            }
        };

        match close {
            Close::Invoke => {
                tracing::trace!(next = self.next.name(), "combinator closed");
                self.next.invoke();
            }
            Close::Cancel => {
                tracing::trace!(next = self.next.name(), "combinator closed canceled");
                self.next.cancel();
            }
        }
    }
}

impl std::fmt::Debug for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let barrier = lock(&self.barrier);
        f.debug_struct("Combinator")
            .field("next", &self.next.name())
            .field("remaining", &barrier.remaining)
            .field("canceled", &barrier.canceled)
            .field("closed", &barrier.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracker {
        invoked: AtomicUsize,
        canceled: AtomicUsize,
    }

    impl Next for Tracker {
        fn invoke(&self) {
            self.invoked.fetch_add(1, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.canceled.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "tracker"
        }
    }

    fn tracked(n: usize) -> (Arc<Tracker>, Arc<Combinator>) {
        let tracker = Arc::new(Tracker::default());
        let combinator = Combinator::new(tracker.clone(), n);
        (tracker, combinator)
    }

    #[test]
    fn test_invokes_after_all_signals() {
        let (tracker, combinator) = tracked(3);

        combinator.signal();
        combinator.signal();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 0);
        assert_eq!(combinator.remaining(), 1);

        combinator.signal();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.canceled.load(Ordering::SeqCst), 0);
        assert!(combinator.is_closed());
    }

    #[test]
    fn test_cancel_counts_toward_close() {
        let (tracker, combinator) = tracked(2);

        combinator.cancel();
        assert_eq!(tracker.canceled.load(Ordering::SeqCst), 0);

        combinator.signal();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.canceled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expect_extends_countdown() {
        let (tracker, combinator) = tracked(1);
        combinator.expect();

        combinator.signal();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 0);

        combinator.signal();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_without_dependencies() {
        let (tracker, combinator) = tracked(0);
        combinator.open();
        assert_eq!(tracker.invoked.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "unresolved dependencies")]
    fn test_open_with_dependencies_panics() {
        let (_, combinator) = tracked(1);
        combinator.open();
    }

    #[test]
    #[should_panic(expected = "closed combinator")]
    fn test_signal_after_close_panics() {
        let (_, combinator) = tracked(1);
        combinator.signal();
        combinator.signal();
    }

    #[test]
    #[should_panic(expected = "closed combinator")]
    fn test_expect_after_close_panics() {
        let (_, combinator) = tracked(1);
        combinator.cancel();
        combinator.expect();
    }

    #[test]
    fn test_concurrent_signals_close_once() {
        for _ in 0..64 {
            let (tracker, combinator) = tracked(16);

            std::thread::scope(|s| {
                for i in 0..16 {
                    let combinator = &combinator;
                    s.spawn(move || {
                        if i % 5 == 0 {
                            combinator.cancel();
                        } else {
                            combinator.signal();
                        }
                    });
                }
            });

            assert_eq!(tracker.invoked.load(Ordering::SeqCst), 0);
            assert_eq!(tracker.canceled.load(Ordering::SeqCst), 1);
        }
    }
}
