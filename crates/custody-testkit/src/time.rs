//! Manually driven wall clock

use async_trait::async_trait;
use custody_core::effects::TimeEffects;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Wall clock set by the test. `sleep` goes through tokio so a paused
/// runtime clock controls it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_secs: AtomicU64,
}

impl ManualClock {
    pub fn new(now_secs: u64) -> Self {
        Self {
            now_secs: AtomicU64::new(now_secs),
        }
    }

    pub fn set(&self, now_secs: u64) {
        self.now_secs.store(now_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimeEffects for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now_secs.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
