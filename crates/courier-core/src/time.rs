//! Clock abstraction for audit timestamps and reconnect delays.
//!
//! The forwarding gateway and the health endpoints stamp times with
//! `now_utc`; the queue consumer waits between reconnect attempts with
//! `sleep`. Tests inject `TestClock` to get deterministic timestamps and
//! sleeps that return at once.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};

/// Source of wall-clock time and delays.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time.
    fn now_system(&self) -> SystemTime;

    /// Waits for `duration`.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Current time as a UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now_system())
    }
}

/// System time and tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Manually driven clock.
///
/// `sleep` moves the clock forward by the requested duration and returns
/// after a single yield. Clones share one timeline.
#[derive(Debug, Clone)]
pub struct TestClock {
    start_ns: u64,
    offset_ns: Arc<AtomicU64>,
}

impl TestClock {
    /// Starts at the current system time.
    pub fn new() -> Self {
        Self::with_start_time(SystemTime::now())
    }

    /// Starts at `start`.
    pub fn with_start_time(start: SystemTime) -> Self {
        let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self { start_ns: saturating_nanos(since_epoch), offset_ns: Arc::new(AtomicU64::new(0)) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.offset_ns.fetch_add(saturating_nanos(duration), Ordering::AcqRel);
    }

    /// Total time advanced so far, by `advance` or `sleep`.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_ns.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_system(&self) -> SystemTime {
        let offset_ns = self.offset_ns.load(Ordering::Acquire);
        UNIX_EPOCH + Duration::from_nanos(self.start_ns.saturating_add(offset_ns))
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
