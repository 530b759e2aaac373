//! Spending keyset creation, descriptor backups and the tail steps

use custody_backup::DescriptorBackupPreparedData;
use custody_core::effects::CreateKeysetRequest;
use custody_core::{
    HwFactorProofOfPossession, LocalRecoveryAttemptProgress, ProgressStep, Recovery, SealedSsek,
    SpendingKeyset, StillRecovering, WalletKind,
};
use tracing::{debug, info};

use super::{require_progress, DelayNotifyOrchestrator};
use crate::error::{RecoveryError, RecoveryResult};

impl DelayNotifyOrchestrator {
    /// Create the spending keyset for the destination keys and commit
    /// `CreatedSpendingKeys`.
    ///
    /// The keyset is private when the account already has a private wallet,
    /// or when both delegation and auto-migration are enabled. Once a keyset
    /// has been committed it is returned without calling the server.
    pub async fn create_spending_keyset(&self) -> RecoveryResult<SpendingKeyset> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        if let Some(keyset) = still.progress().spending_keyset() {
            debug!(keyset_id = %keyset.keyset_id(), "spending keyset already created");
            return Ok(keyset.clone());
        }
        require_progress(
            still.progress(),
            "create_spending_keyset",
            ProgressStep::RotatedAuthKeys,
        )?;

        let account_id = still.full_account_id();
        let listing = self
            .deps
            .keyset_server
            .list_keysets(account_id)
            .await
            .map_err(RecoveryError::at("list_keysets"))?;
        let private = listing.wallet_kind == WalletKind::Private
            || (self.deps.flags.private_wallet_delegation_enabled()
                && self.deps.flags.auto_migrate_private_wallet_on_recovery());

        let request = CreateKeysetRequest {
            account_id: account_id.clone(),
            network: self.config.network,
            app_spending_key: still.local.app_key_bundle.spending_key.clone(),
            hardware_spending_key: still.local.hw_key_bundle.spending_key.clone(),
        };
        let server_keyset = if private {
            self.deps
                .keyset_server
                .create_private_keyset(&request)
                .await
                .map_err(RecoveryError::at("create_private_keyset"))?
        } else {
            self.deps
                .keyset_server
                .create_keyset(&request)
                .await
                .map_err(RecoveryError::at("create_keyset"))?
        };

        let keyset = SpendingKeyset {
            local_id: SpendingKeyset::derived_local_id(&server_keyset.keyset_id),
            network_type: request.network,
            app_key: request.app_spending_key,
            hardware_key: request.hardware_spending_key,
            server_keyset,
        };
        self.progress
            .record(LocalRecoveryAttemptProgress::CreatedSpendingKeys {
                keyset: keyset.clone(),
            })
            .await?;
        info!(%account_id, keyset_id = %keyset.keyset_id(), private, "spending keyset created");
        Ok(keyset)
    }

    /// Work out what the descriptor upload for the new keyset needs.
    pub async fn prepare_descriptor_backups(&self) -> RecoveryResult<DescriptorBackupPreparedData> {
        let still = self.still_recovering().await?;
        let keyset = created_keyset(&still, "prepare_descriptor_backups")?;
        Ok(self
            .deps
            .descriptor_backups
            .prepare_descriptor_backups_for_recovery(
                still.full_account_id(),
                still.factor_to_recover(),
                keyset,
            )
            .await?)
    }

    /// Upload the complete descriptor set and commit
    /// `UploadedDescriptorBackups`.
    ///
    /// `new_sealed_ssek` is the SSEK sealed by the destination hardware; it is
    /// used when there is nothing to decrypt. Returns the keysets covered, or
    /// nothing when the upload was already committed.
    pub async fn upload_descriptor_backups(
        &self,
        prepared: &DescriptorBackupPreparedData,
        new_sealed_ssek: &SealedSsek,
        hw_proof_of_possession: Option<&HwFactorProofOfPossession>,
    ) -> RecoveryResult<Vec<SpendingKeyset>> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        if still
            .progress()
            .has_reached(ProgressStep::UploadedDescriptorBackups)
        {
            debug!("descriptor backups already uploaded");
            return Ok(Vec::new());
        }
        let keyset = created_keyset(&still, "upload_descriptor_backups")?.clone();

        let covered = self
            .deps
            .descriptor_backups
            .upload_descriptor_backups(
                still.full_account_id(),
                prepared,
                new_sealed_ssek,
                &still.local.app_key_bundle.auth_key,
                hw_proof_of_possession,
            )
            .await?;

        self.progress
            .record(LocalRecoveryAttemptProgress::UploadedDescriptorBackups { keyset })
            .await?;
        Ok(covered)
    }

    /// Mark the new keyset active on the server and commit
    /// `ActivatedSpendingKeys`.
    pub async fn activate_spending_keyset(&self) -> RecoveryResult<SpendingKeyset> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        let progress = still.progress();
        require_progress(
            progress,
            "activate_spending_keyset",
            ProgressStep::UploadedDescriptorBackups,
        )?;
        let keyset = progress
            .spending_keyset()
            .cloned()
            .ok_or(RecoveryError::MissingPrerequisite {
                step: "activate_spending_keyset",
                required: ProgressStep::CreatedSpendingKeys.name(),
            })?;
        if progress.has_reached(ProgressStep::ActivatedSpendingKeys) {
            debug!(keyset_id = %keyset.keyset_id(), "spending keyset already active");
            return Ok(keyset);
        }

        let account_id = still.full_account_id();
        self.deps
            .keyset_server
            .activate_keyset(account_id, keyset.keyset_id())
            .await
            .map_err(RecoveryError::at("activate_keyset"))?;
        self.progress
            .record(LocalRecoveryAttemptProgress::ActivatedSpendingKeys {
                keyset: keyset.clone(),
            })
            .await?;
        info!(%account_id, keyset_id = %keyset.keyset_id(), "spending keyset activated");
        Ok(keyset)
    }

    /// Commit `BackedUpToCloud` after the host wrote a cloud backup.
    pub async fn mark_backed_up_to_cloud(&self) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        require_progress(
            still.progress(),
            "mark_backed_up_to_cloud",
            ProgressStep::ActivatedSpendingKeys,
        )?;
        let keyset = still
            .progress()
            .spending_keyset()
            .cloned()
            .ok_or(RecoveryError::MissingPrerequisite {
                step: "mark_backed_up_to_cloud",
                required: ProgressStep::ActivatedSpendingKeys.name(),
            })?;
        self.progress
            .record(LocalRecoveryAttemptProgress::BackedUpToCloud { keyset })
            .await?;
        Ok(())
    }

    /// Commit `SweptFunds` with the keyset funds were swept into.
    pub async fn mark_funds_swept(&self, keyset: &SpendingKeyset) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        require_progress(
            still.progress(),
            "mark_funds_swept",
            ProgressStep::BackedUpToCloud,
        )?;
        self.progress
            .record(LocalRecoveryAttemptProgress::SweptFunds {
                keyset: keyset.clone(),
            })
            .await?;
        Ok(())
    }

    /// Forget the finished recovery.
    pub async fn complete_recovery(&self) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        require_progress(still.progress(), "complete_recovery", ProgressStep::SweptFunds)?;
        self.deps
            .dao
            .clear()
            .await
            .map_err(RecoveryError::at("recovery_dao.clear"))?;
        self.status.publish(Recovery::NoActiveRecovery);
        info!(account_id = %still.full_account_id(), factor = %still.factor_to_recover(), "recovery finished");
        Ok(())
    }
}

fn created_keyset<'a>(
    still: &'a StillRecovering,
    step: &'static str,
) -> RecoveryResult<&'a SpendingKeyset> {
    still
        .progress()
        .spending_keyset()
        .ok_or(RecoveryError::MissingPrerequisite {
            step,
            required: ProgressStep::CreatedSpendingKeys.name(),
        })
}
