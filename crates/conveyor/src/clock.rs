//! Injectable sleep seam for the polling loop.
//!
//! Production code waits on the tokio timer; tests swap in
//! [`InstantSleeper`] to drive 60 poll attempts without wall-clock delay.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer-backed sleeper.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Yields once instead of sleeping, counting calls. For tests: 60 poll
/// attempts complete without wall-clock delay, and the yield gives
/// cooperating test tasks a chance to run between attempts.
#[derive(Default)]
pub struct InstantSleeper {
    calls: AtomicU32,
}

impl InstantSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `sleep` has been awaited.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
    }
}
