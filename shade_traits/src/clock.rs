use std::thread;
use std::time::{Duration, Instant};

/// Time source for stall polling and settle delays.
///
/// Everything in the calibration path waits through this trait, so a
/// simulated clock can run a full session instantly.
pub trait Clock {
    fn now(&self) -> Instant;
    /// Block the caller for `d`, or pretend to.
    fn sleep(&self, d: Duration);

    /// Whole milliseconds since `epoch`; 0 if `epoch` lies in the future.
    fn ms_since(&self, epoch: Instant) -> u64 {
        u64::try_from(self.elapsed_since(epoch).as_millis()).unwrap_or(u64::MAX)
    }

    /// Time since `epoch`; zero if `epoch` lies in the future.
    fn elapsed_since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

/// Wall-clock implementation on `Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::{Clock, Duration, Instant};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Simulated clock: `sleep` moves time forward and returns at once.
    ///
    /// Clones share one timeline, so a test can hand a clone to the code
    /// under test and read back how much simulated time it spent.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        elapsed_ns: Arc<AtomicU64>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed_ns: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn advance(&self, d: Duration) {
            let ns = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
            let _ = self
                .elapsed_ns
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                    Some(cur.saturating_add(ns))
                });
        }

        /// Simulated time since construction.
        pub fn offset(&self) -> Duration {
            Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.offset()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}
