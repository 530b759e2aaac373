//! Cancellation for user-driven flows
//!
//! Hardware taps and server calls suspend while the user is still able to
//! leave the flow. A [`CancellationToken`] is handed to those suspension points;
//! [`run_until_cancelled`] races an operation against it.

use crate::{CustodyError, CustodyResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Watch-backed cancellation signal. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation to every clone.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `fut` unless `token` fires first; a fired token drops the operation.
pub async fn run_until_cancelled<T, F>(token: &CancellationToken, fut: F) -> CustodyResult<T>
where
    F: Future<Output = CustodyResult<T>>,
{
    if token.is_cancelled() {
        return Err(CustodyError::cancelled("flow exited before start"));
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CustodyError::cancelled("flow exited")),
        result = fut => result,
    }
}
