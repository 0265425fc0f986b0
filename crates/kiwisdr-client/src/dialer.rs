//! Session id allocation and dial serialization.
//!
//! The KiwiSDR names each session by a client-chosen number in the WebSocket
//! path and rejects handshakes that overlap. A [`Dialer`] bundles the two
//! pieces of process-wide state this needs: the id allocator and the lock
//! that spaces connection attempts apart. Create one at startup and pass it
//! to every session you open.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pause after each connection attempt before the next may start.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Hands out strictly increasing session ids seeded from the wall clock.
#[derive(Debug, Default)]
pub struct ClientIdAllocator {
    last: Mutex<i64>,
}

impl ClientIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id: the current Unix time in seconds, or one more
    /// than the previous id if the clock has not moved past it.
    pub fn next_id(&self) -> i64 {
        self.next_id_at(unix_seconds())
    }

    fn next_id_at(&self, now: i64) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let id = if now > *last { now } else { *last + 1 };
        *last = id;
        id
    }
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Process-wide connection limiter shared by every session.
#[derive(Debug)]
pub struct Dialer {
    ids: ClientIdAllocator,
    dial_lock: tokio::sync::Mutex<()>,
    settle_delay: Duration,
}

impl Dialer {
    pub fn new() -> Self {
        Self::with_settle_delay(DEFAULT_SETTLE_DELAY)
    }

    /// A dialer that waits `settle_delay` after each attempt.
    pub fn with_settle_delay(settle_delay: Duration) -> Self {
        Dialer {
            ids: ClientIdAllocator::new(),
            dial_lock: tokio::sync::Mutex::new(()),
            settle_delay,
        }
    }

    pub fn ids(&self) -> &ClientIdAllocator {
        &self.ids
    }

    /// Run one connection attempt while holding the dial lock.
    ///
    /// The lock is held until the settle delay after the attempt has passed,
    /// whether the attempt succeeded or not.
    pub(crate) async fn serialize<F, T>(&self, attempt: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.dial_lock.lock().await;
        let outcome = attempt.await;
        tokio::time::sleep(self.settle_delay).await;
        outcome
    }
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new()
    }
}
