//! Persisted recovery records

use crate::recovery::{LocalRecovery, LocalRecoveryAttemptProgress, ServerRecovery};
use crate::CustodyResult;
use async_trait::async_trait;

/// Durable storage for the local recovery and the last polled server record.
///
/// Writes are transactional: a failed write leaves the previous value intact.
#[async_trait]
pub trait RecoveryDao: Send + Sync {
    /// The recovery initiated from this device.
    async fn local_recovery(&self) -> CustodyResult<Option<LocalRecovery>>;

    /// Replace the local recovery.
    async fn set_local_recovery(&self, recovery: &LocalRecovery) -> CustodyResult<()>;

    /// Update only the progress of the local recovery; `NotFound` if none exists.
    async fn set_local_recovery_progress(
        &self,
        progress: &LocalRecoveryAttemptProgress,
    ) -> CustodyResult<()>;

    /// Last server record.
    async fn server_recovery(&self) -> CustodyResult<Option<ServerRecovery>>;

    /// Replace the cached server record; `None` means the server reports no recovery.
    async fn set_active_server_recovery(&self, recovery: Option<&ServerRecovery>)
        -> CustodyResult<()>;

    /// Remove both records.
    async fn clear(&self) -> CustodyResult<()>;
}
