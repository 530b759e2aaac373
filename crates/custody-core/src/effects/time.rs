//! Wall-clock time and sleeping

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source for delay checks and the rotation floor.
#[async_trait]
pub trait TimeEffects: Send + Sync {
    /// Current unix time in seconds.
    fn now_secs(&self) -> u64;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// System clock with tokio sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeHandler;

impl SystemTimeHandler {
    /// Create a new handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeEffects for SystemTimeHandler {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
