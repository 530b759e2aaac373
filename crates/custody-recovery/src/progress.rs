//! Monotonic progress recording
//!
//! Progress is committed only after the step it names has fully succeeded.
//! Replaying the committed step is a no-op; anything lower is rejected.

use custody_core::effects::RecoveryDao;
use custody_core::{LocalRecoveryAttemptProgress, Recovery};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RecoveryError, RecoveryResult};
use crate::state::RecoveryStatusCell;

/// Writes progress through the recovery DAO and republishes the status.
#[derive(Clone)]
pub struct ProgressRecorder {
    dao: Arc<dyn RecoveryDao>,
    status: RecoveryStatusCell,
}

impl ProgressRecorder {
    /// Create a recorder over `dao` publishing to `status`.
    pub fn new(dao: Arc<dyn RecoveryDao>, status: RecoveryStatusCell) -> Self {
        Self { dao, status }
    }

    /// Currently committed progress, `None` without a local recovery.
    pub async fn committed(&self) -> RecoveryResult<Option<LocalRecoveryAttemptProgress>> {
        Ok(self
            .dao
            .local_recovery()
            .await
            .map_err(RecoveryError::at("recovery_dao.local_recovery"))?
            .map(|local| local.progress))
    }

    /// Commit `progress` and return the committed value.
    ///
    /// An equal step keeps what is already stored. Once the write succeeds the
    /// step is committed; a failed status republish is only logged and the
    /// next sync publishes it.
    pub async fn record(
        &self,
        progress: LocalRecoveryAttemptProgress,
    ) -> RecoveryResult<LocalRecoveryAttemptProgress> {
        let committed = self
            .committed()
            .await?
            .ok_or(RecoveryError::NotInProgress {
                state: Recovery::NoActiveRecovery.name(),
            })?;

        if progress.ordinal() < committed.ordinal() {
            warn!(
                committed = committed.name(),
                attempted = progress.name(),
                "rejected progress regression"
            );
            return Err(RecoveryError::ProgressRegression {
                committed: committed.name(),
                attempted: progress.name(),
            });
        }

        if progress.ordinal() == committed.ordinal() {
            if progress != committed {
                warn!(step = committed.name(), "replayed step differs; keeping committed value");
            } else {
                debug!(step = committed.name(), "progress already committed");
            }
            return Ok(committed);
        }

        self.dao
            .set_local_recovery_progress(&progress)
            .await
            .map_err(RecoveryError::at("recovery_dao.set_local_recovery_progress"))?;
        info!(from = committed.name(), to = progress.name(), "recovery progress committed");

        if let Err(error) = self.status.republish_from(self.dao.as_ref()).await {
            warn!(step = progress.name(), %error, "committed progress not republished");
        }
        Ok(progress)
    }
}

impl std::fmt::Debug for ProgressRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRecorder").finish_non_exhaustive()
    }
}
