//! Social-recovery relationships after auth key rotation

use custody_core::effects::{TrustedContact, TrustedContactKeyCertificate};
use custody_core::{CustodyError, ProgressStep, RelationshipId, StillRecovering};
use futures::future::join_all;
use tracing::{info, warn};

use super::{require_progress, DelayNotifyOrchestrator};
use crate::error::{RecoveryError, RecoveryResult};

/// A contact whose endorsement could not be renewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipFailure {
    /// Contact relationship
    pub relationship_id: RelationshipId,
    /// Why it failed
    pub error: CustodyError,
}

/// Outcome of re-endorsing trusted contacts under the rotated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedContactRegeneration {
    /// Contacts endorsed under the new keys
    pub endorsed: Vec<RelationshipId>,
    /// Contacts still carrying a certificate for the old keys
    pub needs_reendorsement: Vec<RelationshipFailure>,
}

impl TrustedContactRegeneration {
    /// Whether every endorsed contact was renewed.
    pub fn is_complete(&self) -> bool {
        self.needs_reendorsement.is_empty()
    }
}

/// Outcome of removing one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRemoval {
    /// Relationship that was targeted
    pub relationship_id: RelationshipId,
    /// What the server said
    pub result: Result<(), CustodyError>,
}

impl DelayNotifyOrchestrator {
    /// Re-endorse every previously endorsed trusted contact under the
    /// destination auth keys, then refresh the relationship cache.
    ///
    /// Contacts that fail are reported in
    /// [`TrustedContactRegeneration::needs_reendorsement`]; they do not fail
    /// the call and do not block the rest of the recovery.
    pub async fn regenerate_trusted_contact_certificates(
        &self,
    ) -> RecoveryResult<TrustedContactRegeneration> {
        let still = self.still_recovering().await?;
        require_progress(
            still.progress(),
            "regenerate_trusted_contact_certificates",
            ProgressStep::RotatedAuthKeys,
        )?;
        let account_id = still.full_account_id();

        let relationships = self
            .deps
            .relationships
            .relationships(account_id)
            .await
            .map_err(RecoveryError::at("relationships"))?;
        let endorsed_before = relationships
            .trusted_contacts
            .iter()
            .filter(|contact| contact.key_certificate.is_some());

        let still = &still;
        let outcomes = join_all(endorsed_before.map(|contact| async move {
            let result = self.reendorse(still, contact).await;
            (contact.relationship_id.clone(), result)
        }))
        .await;

        let mut regeneration = TrustedContactRegeneration::default();
        for (relationship_id, result) in outcomes {
            match result {
                Ok(()) => regeneration.endorsed.push(relationship_id),
                Err(error) => {
                    warn!(%relationship_id, %error, "trusted contact needs re-endorsement");
                    regeneration.needs_reendorsement.push(RelationshipFailure {
                        relationship_id,
                        error,
                    });
                }
            }
        }

        self.deps
            .relationships
            .sync_relationships(account_id)
            .await
            .map_err(RecoveryError::at("sync_relationships"))?;
        info!(
            %account_id,
            endorsed = regeneration.endorsed.len(),
            pending = regeneration.needs_reendorsement.len(),
            "trusted contact certificates regenerated"
        );
        Ok(regeneration)
    }

    async fn reendorse(
        &self,
        still: &StillRecovering,
        contact: &TrustedContact,
    ) -> Result<(), CustodyError> {
        let local = &still.local;
        let identity_signature = self
            .deps
            .app_signer
            .sign(
                local.app_key_bundle.auth_key.as_auth_key(),
                contact.delegated_decryption_key.as_str().as_bytes(),
            )
            .await?;
        let certificate = TrustedContactKeyCertificate {
            delegated_decryption_key: contact.delegated_decryption_key.clone(),
            hw_auth_public_key: local.hw_key_bundle.auth_key.clone(),
            app_global_auth_public_key: local.app_key_bundle.auth_key.clone(),
            app_global_auth_key_hw_signature: local.app_global_auth_key_hw_signature.clone(),
            trusted_contact_identity_key_app_signature: identity_signature,
        };
        self.deps
            .relationships
            .endorse_trusted_contact(still.full_account_id(), &contact.relationship_id, &certificate)
            .await
    }

    /// Remove every protected-customer relationship, each independently.
    pub async fn remove_trusted_contacts(&self) -> RecoveryResult<Vec<RelationshipRemoval>> {
        let still = self.still_recovering().await?;
        let account_id = still.full_account_id();
        let relationships = self
            .deps
            .relationships
            .relationships(account_id)
            .await
            .map_err(RecoveryError::at("relationships"))?;

        let removals = join_all(relationships.protected_customers.iter().map(|customer| async move {
            let result = self
                .deps
                .relationships
                .remove_relationship(account_id, &customer.relationship_id)
                .await;
            if let Err(error) = &result {
                warn!(relationship_id = %customer.relationship_id, %error, "relationship removal failed");
            }
            RelationshipRemoval {
                relationship_id: customer.relationship_id.clone(),
                result,
            }
        }))
        .await;

        info!(
            %account_id,
            removed = removals.iter().filter(|removal| removal.result.is_ok()).count(),
            attempted = removals.len(),
            "protected customer relationships removed"
        );
        Ok(removals)
    }
}
