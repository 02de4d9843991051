//! Time sources for the session.
//!
//! Lockout expiry is persisted, so it is measured in wall-clock epoch
//! seconds.  Idle time never leaves the process and uses a monotonic
//! clock so that wall-clock jumps cannot extend an unlocked session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_epoch_secs(&self) -> u64;

    /// Time elapsed since an arbitrary, fixed origin.
    fn monotonic(&self) -> Duration;
}

/// The real clock.
///
/// The monotonic reading comes from `tokio::time::Instant`, which is the
/// std instant in production and follows the paused test clock under
/// `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.  Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch_secs: Arc<AtomicU64>,
    monotonic_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(epoch_secs: u64) -> Self {
        Self {
            epoch_secs: Arc::new(AtomicU64::new(epoch_secs)),
            monotonic_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move both readings forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.epoch_secs.fetch_add(by.as_secs(), Ordering::SeqCst);
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.monotonic_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_secs(&self) -> u64 {
        self.epoch_secs.load(Ordering::SeqCst)
    }

    fn monotonic(&self) -> Duration {
        Duration::from_millis(self.monotonic_ms.load(Ordering::SeqCst))
    }
}
