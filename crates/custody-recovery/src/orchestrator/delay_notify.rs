//! Cancellation, completion and auth key rotation

use custody_core::effects::{AuthTokenScope, AuthenticatedAccount, HardwareTransport};
use custody_core::{
    AuthPublicKey, CancellationToken, CompleteDelayNotifyChallenge, CustodyError,
    DestinationAuthKeys, FullAccountId, HwFactorProofOfPossession, Keybox,
    LocalRecoveryAttemptProgress, PhysicalFactor, ProgressStep, Recovery, SealedCsek, SealedSsek,
    SignedChallenge, run_until_cancelled,
};
use tracing::{debug, info, warn};

use super::{require_progress, DelayNotifyOrchestrator};
use crate::error::{RecoveryError, RecoveryResult};

impl DelayNotifyOrchestrator {
    /// Cancel the recovery on the server and forget it locally.
    ///
    /// A server answer that no recovery exists counts as cancelled.
    pub async fn cancel_delay_notify(&self) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        let account_id = still.full_account_id();

        match self.deps.recovery_server.cancel_recovery(account_id).await {
            Ok(()) => {}
            Err(CustodyError::NotFound { .. }) => {
                debug!(%account_id, "server has no recovery to cancel");
            }
            Err(source) => return Err(RecoveryError::at("cancel_recovery")(source)),
        }

        self.deps
            .dao
            .clear()
            .await
            .map_err(RecoveryError::at("recovery_dao.clear"))?;
        self.status.publish(Recovery::NoActiveRecovery);
        info!(%account_id, factor = %still.factor_to_recover(), "delay and notify cancelled");
        Ok(())
    }

    /// Have the hardware sign this recovery's completion challenge.
    pub async fn sign_completion_challenge(
        &self,
        hardware: &dyn HardwareTransport,
        token: &CancellationToken,
    ) -> RecoveryResult<SignedChallenge> {
        let still = self.still_recovering().await?;
        let challenge = CompleteDelayNotifyChallenge::new(
            still.factor_to_recover(),
            &still.local.destination_auth_keys(),
        );
        let signature = run_until_cancelled(token, hardware.sign_challenge(challenge.as_bytes()))
            .await
            .map_err(RecoveryError::at("hardware.sign_challenge"))?;
        Ok(SignedChallenge::HardwareSigned {
            challenge,
            signature,
        })
    }

    /// Commit `AttemptingCompletion`, sign the challenge with the new app
    /// global auth key, and complete the delay with the server.
    ///
    /// `hw_signed` must be the hardware's signature over this recovery's
    /// challenge and the server delay must have elapsed; anything else fails
    /// before any write or network call. The call never
    /// returns sooner than the configured minimum rotation duration, counted
    /// from after validation. Already-rotated recoveries return immediately.
    /// When `AttemptingCompletion` was already committed its sealed keys are
    /// kept and `sealed_csek`/`sealed_ssek` are ignored.
    pub async fn rotate_auth_keys(
        &self,
        hw_signed: &SignedChallenge,
        sealed_csek: SealedCsek,
        sealed_ssek: SealedSsek,
    ) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        let account_id = still.full_account_id().clone();
        let expected = CompleteDelayNotifyChallenge::new(
            still.factor_to_recover(),
            &still.local.destination_auth_keys(),
        );

        if hw_signed.signer() != PhysicalFactor::Hardware {
            return Err(RecoveryError::WrongSigner {
                expected: PhysicalFactor::Hardware,
                signer: hw_signed.signer(),
            });
        }
        if hw_signed.challenge() != &expected {
            return Err(RecoveryError::ChallengeMismatch);
        }
        if still.progress().has_reached(ProgressStep::RotatedAuthKeys) {
            debug!(%account_id, "auth keys already rotated");
            return Ok(());
        }
        let remaining_secs = still.delay_remaining(self.deps.time.now_secs());
        if remaining_secs > 0 {
            return Err(RecoveryError::DelayPending { remaining_secs });
        }
        let retrying = still.progress().has_attempted_completion();

        let complete = async {
            self.progress
                .record(LocalRecoveryAttemptProgress::AttemptingCompletion {
                    sealed_csek,
                    sealed_ssek,
                })
                .await?;

            let app_signature = self
                .deps
                .app_signer
                .sign(
                    still.local.app_key_bundle.auth_key.as_auth_key(),
                    expected.as_bytes(),
                )
                .await
                .map_err(RecoveryError::at("app_signer.sign"))?;

            match self
                .deps
                .recovery_server
                .complete_recovery(&account_id, &expected, &app_signature, hw_signed.signature())
                .await
            {
                Ok(()) => {}
                Err(CustodyError::NotFound { .. }) if retrying => {
                    debug!(%account_id, "server already completed this recovery");
                }
                Err(source) => return Err(RecoveryError::at("complete_recovery")(source)),
            }

            self.deps
                .dao
                .set_active_server_recovery(None)
                .await
                .map_err(RecoveryError::at("recovery_dao.set_active_server_recovery"))?;
            self.status.republish_from(self.deps.dao.as_ref()).await?;
            Ok(())
        };

        let (result, ()) = tokio::join!(
            complete,
            self.deps.time.sleep(self.config.minimum_rotation_duration())
        );
        result?;

        info!(%account_id, factor = %still.factor_to_recover(), "delay and notify completed");
        Ok(())
    }

    /// Authenticate with both new app auth keys, rotate the active keybox if
    /// there is one, store the fresh tokens, and commit `RotatedAuthKeys`.
    ///
    /// Both authentications complete before anything is stored. Tokens for
    /// both scopes are written in one batch; when that write fails a rotated
    /// keybox gets its previous auth keys back.
    pub async fn rotate_auth_tokens(&self) -> RecoveryResult<()> {
        let _guard = self.lock.acquire().await;
        let still = self.still_recovering().await?;
        require_progress(
            still.progress(),
            "rotate_auth_tokens",
            ProgressStep::AttemptingCompletion,
        )?;
        if still.progress().has_reached(ProgressStep::RotatedAuthKeys) {
            return Ok(());
        }

        let account_id = still.full_account_id();
        let keys = still.local.destination_auth_keys();

        let global = self
            .authenticate(account_id, keys.app_global_auth_key.as_auth_key(), AuthTokenScope::Global)
            .await
            .map_err(RecoveryError::at("authenticate_global"))?;
        let recovery = self
            .authenticate(
                account_id,
                keys.app_recovery_auth_key.as_auth_key(),
                AuthTokenScope::Recovery,
            )
            .await
            .map_err(RecoveryError::at("authenticate_recovery"))?;

        let previous_keybox = self
            .deps
            .keybox_store
            .active_keybox()
            .await
            .map_err(RecoveryError::at("active_keybox"))?;
        if previous_keybox.is_some() {
            self.deps
                .keybox_store
                .rotate_keybox_auth_keys(&keys, &still.local.app_global_auth_key_hw_signature)
                .await
                .map_err(RecoveryError::at("rotate_keybox_auth_keys"))?;
        }

        let stored = self
            .deps
            .token_store
            .set_tokens(
                account_id,
                vec![
                    (AuthTokenScope::Global, global.tokens),
                    (AuthTokenScope::Recovery, recovery.tokens),
                ],
            )
            .await;
        if let Err(source) = stored {
            if let Some(previous) = &previous_keybox {
                self.restore_keybox_auth_keys(previous).await;
            }
            return Err(RecoveryError::at("token_store.set_tokens")(source));
        }

        self.progress
            .record(LocalRecoveryAttemptProgress::RotatedAuthKeys)
            .await?;
        info!(%account_id, rotated_keybox = previous_keybox.is_some(), "auth tokens rotated");
        Ok(())
    }

    /// Re-authenticate with both rotated keys.
    ///
    /// Failure means the rotation went through but the new keys do not work,
    /// reported as [`RecoveryError::VerificationFailed`].
    pub async fn verify_auth_keys_after_rotation(&self) -> RecoveryResult<()> {
        let still = self.still_recovering().await?;
        require_progress(
            still.progress(),
            "verify_auth_keys_after_rotation",
            ProgressStep::RotatedAuthKeys,
        )?;
        let account_id = still.full_account_id();
        let keys = still.local.destination_auth_keys();

        for (key, scope) in [
            (keys.app_global_auth_key.as_auth_key(), AuthTokenScope::Global),
            (keys.app_recovery_auth_key.as_auth_key(), AuthTokenScope::Recovery),
        ] {
            self.authenticate(account_id, key, scope)
                .await
                .map_err(|source| RecoveryError::VerificationFailed { scope, source })?;
        }
        debug!(%account_id, "rotated auth keys verified");
        Ok(())
    }

    /// Have the hardware sign the stored global access token.
    pub async fn hardware_proof_of_possession(
        &self,
        hardware: &dyn HardwareTransport,
        token: &CancellationToken,
    ) -> RecoveryResult<HwFactorProofOfPossession> {
        let still = self.still_recovering().await?;
        let tokens = self
            .deps
            .token_store
            .tokens(still.full_account_id(), AuthTokenScope::Global)
            .await
            .map_err(RecoveryError::at("token_store.tokens"))?
            .ok_or(RecoveryError::MissingPrerequisite {
                step: "hardware_proof_of_possession",
                required: ProgressStep::RotatedAuthKeys.name(),
            })?;
        let hw_signature = run_until_cancelled(token, hardware.sign_access_token(&tokens.access_token))
            .await
            .map_err(RecoveryError::at("hardware.sign_access_token"))?;
        Ok(HwFactorProofOfPossession { hw_signature })
    }

    async fn restore_keybox_auth_keys(&self, previous: &Keybox) {
        let keys = DestinationAuthKeys {
            app_global_auth_key: previous.active_app_key_bundle.auth_key.clone(),
            app_recovery_auth_key: previous.active_app_key_bundle.recovery_auth_key.clone(),
            hardware_auth_key: previous.active_hw_key_bundle.auth_key.clone(),
        };
        if let Err(error) = self
            .deps
            .keybox_store
            .rotate_keybox_auth_keys(&keys, &previous.app_global_auth_key_hw_signature)
            .await
        {
            warn!(
                account_id = %previous.full_account_id,
                %error,
                "could not restore keybox auth keys after token write failed"
            );
        }
    }

    async fn authenticate(
        &self,
        account_id: &FullAccountId,
        key: &AuthPublicKey,
        scope: AuthTokenScope,
    ) -> Result<AuthenticatedAccount, CustodyError> {
        let authenticated = self.deps.authenticator.authenticate(key, scope).await?;
        if &authenticated.account_id != account_id {
            return Err(CustodyError::invalid(format!(
                "{scope:?} key authenticated as account {}",
                authenticated.account_id
            )));
        }
        Ok(authenticated)
    }
}
