//! Delay-and-notify orchestrator
//!
//! Drives a recovery this device started, one explicit operation at a time.
//! Every operation re-reads the current [`Recovery`] and fails fast unless it
//! is [`Recovery::StillRecovering`]. Operations that touch rotation,
//! completion, keysets or progress hold the [`RecoveryLock`].
//!
//! Commit order, from [`LocalRecoveryAttemptProgress`]:
//!
//! 1. `AttemptingCompletion` written, then the server completes the delay
//! 2. `RotatedAuthKeys` after fresh tokens are stored
//! 3. `CreatedSpendingKeys` after the server creates the keyset
//! 4. `UploadedDescriptorBackups` after the full descriptor set is uploaded
//! 5. `ActivatedSpendingKeys` after the server activates the keyset
//! 6. `BackedUpToCloud`, `SweptFunds`, then the local recovery is cleared
//!
//! [`DelayNotifyOrchestrator::pending_step`] maps committed progress to the
//! next operation so a restarted process resumes without replaying work.

mod delay_notify;
mod keysets;
mod trusted_contacts;

pub use trusted_contacts::{RelationshipFailure, RelationshipRemoval, TrustedContactRegeneration};

use custody_backup::DescriptorBackupService;
use custody_core::effects::{
    AccountAuthenticator, AppAuthKeySigner, AuthTokenStore, FeatureFlags, KeyboxStore,
    KeysetServer, RecoveryDao, RecoveryServer, RelationshipsService, TimeEffects,
};
use custody_core::{
    CancellationToken, LocalRecoveryAttemptProgress, ProgressStep, Recovery, RecoveryConfig,
    StillRecovering,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{RecoveryError, RecoveryResult};
use crate::lock::RecoveryLock;
use crate::progress::ProgressRecorder;
use crate::state::RecoveryStatusCell;

/// Collaborators the orchestrator calls.
#[derive(Clone)]
pub struct RecoveryCollaborators {
    /// Recovery endpoints
    pub recovery_server: Arc<dyn RecoveryServer>,
    /// Keyset endpoints
    pub keyset_server: Arc<dyn KeysetServer>,
    /// Persisted recovery records
    pub dao: Arc<dyn RecoveryDao>,
    /// Active keybox, when a full account is active
    pub keybox_store: Arc<dyn KeyboxStore>,
    /// Backend authentication
    pub authenticator: Arc<dyn AccountAuthenticator>,
    /// Token persistence
    pub token_store: Arc<dyn AuthTokenStore>,
    /// App auth key signing
    pub app_signer: Arc<dyn AppAuthKeySigner>,
    /// Social-recovery relationships
    pub relationships: Arc<dyn RelationshipsService>,
    /// Feature flags
    pub flags: Arc<dyn FeatureFlags>,
    /// Clock and sleeping
    pub time: Arc<dyn TimeEffects>,
    /// Descriptor backups
    pub descriptor_backups: DescriptorBackupService,
}

/// Next operation implied by committed progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStep {
    /// The server delay period has not elapsed
    WaitForDelay {
        /// Seconds left
        remaining_secs: u64,
    },
    /// Sign the completion challenge and call [`DelayNotifyOrchestrator::rotate_auth_keys`]
    RotateAuthKeys,
    /// Call [`DelayNotifyOrchestrator::rotate_auth_tokens`]
    RotateAuthTokens,
    /// Call [`DelayNotifyOrchestrator::create_spending_keyset`]
    CreateSpendingKeyset,
    /// Prepare and upload descriptor backups
    UploadDescriptorBackups,
    /// Call [`DelayNotifyOrchestrator::activate_spending_keyset`]
    ActivateSpendingKeyset,
    /// Write a cloud backup, then [`DelayNotifyOrchestrator::mark_backed_up_to_cloud`]
    BackUpToCloud,
    /// Sweep funds, then [`DelayNotifyOrchestrator::mark_funds_swept`]
    SweepFunds,
    /// Call [`DelayNotifyOrchestrator::complete_recovery`]
    Complete,
}

/// Drives a delay-and-notify recovery.
#[derive(Clone)]
pub struct DelayNotifyOrchestrator {
    deps: RecoveryCollaborators,
    lock: RecoveryLock,
    status: RecoveryStatusCell,
    progress: ProgressRecorder,
    config: RecoveryConfig,
}

impl DelayNotifyOrchestrator {
    /// Create an orchestrator sharing `lock` and `status` with the synchronizer.
    pub fn new(
        deps: RecoveryCollaborators,
        lock: RecoveryLock,
        status: RecoveryStatusCell,
        config: RecoveryConfig,
    ) -> Self {
        let progress = ProgressRecorder::new(deps.dao.clone(), status.clone());
        Self {
            deps,
            lock,
            status,
            progress,
            config,
        }
    }

    /// Status cell this orchestrator publishes to.
    pub fn status(&self) -> &RecoveryStatusCell {
        &self.status
    }

    /// Current recovery; while nothing has been published yet the persisted
    /// records are merged and published.
    pub async fn current_recovery(&self) -> RecoveryResult<Recovery> {
        match self.status.current() {
            Recovery::Loading => self.status.republish_from(self.deps.dao.as_ref()).await,
            recovery => Ok(recovery),
        }
    }

    async fn still_recovering(&self) -> RecoveryResult<StillRecovering> {
        match self.current_recovery().await? {
            Recovery::StillRecovering(still) => Ok(*still),
            other => Err(RecoveryError::NotInProgress { state: other.name() }),
        }
    }

    /// Next operation to run for the current recovery.
    pub async fn pending_step(&self) -> RecoveryResult<RecoveryStep> {
        let still = self.still_recovering().await?;
        let step = match still.progress() {
            LocalRecoveryAttemptProgress::Initiated => {
                let remaining_secs = still.delay_remaining(self.deps.time.now_secs());
                if remaining_secs > 0 {
                    RecoveryStep::WaitForDelay { remaining_secs }
                } else {
                    RecoveryStep::RotateAuthKeys
                }
            }
            // The server drops its record once completion succeeds.
            LocalRecoveryAttemptProgress::AttemptingCompletion { .. } => {
                if still.server.is_some() {
                    RecoveryStep::RotateAuthKeys
                } else {
                    RecoveryStep::RotateAuthTokens
                }
            }
            LocalRecoveryAttemptProgress::RotatedAuthKeys => RecoveryStep::CreateSpendingKeyset,
            LocalRecoveryAttemptProgress::CreatedSpendingKeys { .. } => {
                RecoveryStep::UploadDescriptorBackups
            }
            LocalRecoveryAttemptProgress::UploadedDescriptorBackups { .. } => {
                RecoveryStep::ActivateSpendingKeyset
            }
            LocalRecoveryAttemptProgress::ActivatedSpendingKeys { .. } => {
                RecoveryStep::BackUpToCloud
            }
            LocalRecoveryAttemptProgress::BackedUpToCloud { .. } => RecoveryStep::SweepFunds,
            LocalRecoveryAttemptProgress::SweptFunds { .. } => RecoveryStep::Complete,
        };
        Ok(step)
    }

    /// Run `op` until `token` fires. On cancellation the operation is
    /// dropped, the last committed state is republished, and
    /// [`RecoveryError::Cancelled`] is returned.
    pub async fn run_cancellable<T, F>(&self, token: &CancellationToken, op: F) -> RecoveryResult<T>
    where
        F: Future<Output = RecoveryResult<T>>,
    {
        if token.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(RecoveryError::Cancelled),
            result = op => result,
        };
        if matches!(result, Err(RecoveryError::Cancelled)) {
            info!("recovery operation cancelled by user");
            if let Err(err) = self.status.republish_from(self.deps.dao.as_ref()).await {
                warn!(error = %err, "could not republish recovery state after cancellation");
            }
        }
        result
    }
}

impl std::fmt::Debug for DelayNotifyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayNotifyOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Fail unless `progress` has reached `required`.
fn require_progress(
    progress: &LocalRecoveryAttemptProgress,
    step: &'static str,
    required: ProgressStep,
) -> RecoveryResult<()> {
    if !progress.has_reached(required) {
        return Err(RecoveryError::MissingPrerequisite {
            step,
            required: required.name(),
        });
    }
    Ok(())
}
