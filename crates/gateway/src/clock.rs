//! Monotonic time source and sleep primitive. Everything that waits (retry
//! spacing, cycle period) goes through [`Clock`] so the cycle logic can be
//! driven in tests without real time passing.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub trait Clock: Clone + Send + Sync {
    /// Milliseconds elapsed since the gateway booted.
    fn now_ms(&self) -> u64;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Fixed try budget with a constant delay between consecutive tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

// ---------------------------------------------------------------------------
// Production clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

// ---------------------------------------------------------------------------
// Virtual clock for tests
// ---------------------------------------------------------------------------


// ===========================================================================
// Tests
// ===========================================================================
