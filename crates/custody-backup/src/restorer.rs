//! Key backup restoration
//!
//! Restoring is: find the unsealed CSEK, open the key bundle, write private
//! keys, and assemble an [`AccountRestoration`]. No network calls are made.
//! Stores are keyed by public key, so restoring the same backup twice
//! overwrites rather than duplicates.

use custody_core::effects::{AppPrivateKeyStore, CsekStore, RelationshipsKeyStore};
use custody_core::{
    AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, AppKeyBundle, AppRecoveryAuthPublicKey,
    FullAccountConfig, HwKeyBundle, LocalId, SpendingKeyset,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::codec::{BackupCodec, BackupKeyset, VersionedBackup};
use crate::error::{CodecError, RestorerError};

/// Everything account activation needs from a restored backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRestoration {
    /// Active keyset
    pub active_spending_keyset: SpendingKeyset,
    /// Keysets listed in the backup; may be empty for older backups
    pub keysets: Vec<SpendingKeyset>,
    /// Active app keys
    pub active_app_key_bundle: AppKeyBundle,
    /// Active hardware keys
    pub active_hw_key_bundle: HwKeyBundle,
    /// Account configuration
    pub account_config: FullAccountConfig,
    /// Backup JSON to keep locally
    pub raw_backup_for_local_storage: String,
    /// Hardware signature over the app global auth key
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
}

/// Restores account keys from a cloud backup.
#[derive(Clone)]
pub struct KeyBackupRestorer {
    codec: BackupCodec,
    csek_store: Arc<dyn CsekStore>,
    private_keys: Arc<dyn AppPrivateKeyStore>,
    relationship_keys: Arc<dyn RelationshipsKeyStore>,
}

impl KeyBackupRestorer {
    /// Create a restorer over the given stores.
    pub fn new(
        codec: BackupCodec,
        csek_store: Arc<dyn CsekStore>,
        private_keys: Arc<dyn AppPrivateKeyStore>,
        relationship_keys: Arc<dyn RelationshipsKeyStore>,
    ) -> Self {
        Self {
            codec,
            csek_store,
            private_keys,
            relationship_keys,
        }
    }

    /// Restore `backup`, writing its private keys.
    pub async fn restore(
        &self,
        backup: &VersionedBackup,
    ) -> Result<AccountRestoration, RestorerError> {
        let csek = self
            .csek_store
            .get(&backup.sealed_csek)
            .await
            .map_err(RestorerError::SecretStore)?
            .ok_or(RestorerError::PkekMissing)?;

        let decoded = self.codec.open_account_keys(backup, &csek)?;
        let keys = decoded.keys;
        debug!(
            account_id = %backup.account_id,
            version = decoded.version.number(),
            keysets = keys.keysets.len(),
            "opened account key bundle"
        );

        self.private_keys
            .store_spending_keypair(&keys.app_spending_keypair)
            .await
            .map_err(RestorerError::AppSpendingKeypairStorage)?;
        for keypair in [&keys.app_global_auth_keypair, &keys.app_recovery_auth_keypair] {
            self.private_keys
                .store_auth_keypair(keypair)
                .await
                .map_err(RestorerError::AppAuthKeypairStorage)?;
        }
        if let Some(delegated) = &keys.delegated_decryption_keypair {
            self.relationship_keys
                .store_delegated_decryption_keypair(delegated)
                .await
                .map_err(RestorerError::RelationshipsKeyStorage)?;
        }

        let account_id = &backup.account_id;
        let active_spending_keyset = keys.active_spending_keyset.to_keyset();
        let keysets = keys.keysets.iter().map(BackupKeyset::to_keyset).collect();
        let network_type = active_spending_keyset.network_type;

        let active_app_key_bundle = AppKeyBundle {
            local_id: LocalId::derived(&[
                "app-key-bundle",
                account_id.as_str(),
                keys.app_global_auth_keypair.public_key.as_str(),
            ]),
            spending_key: active_spending_keyset.app_key.clone(),
            auth_key: AppGlobalAuthPublicKey(keys.app_global_auth_keypair.public_key.clone()),
            network_type,
            recovery_auth_key: AppRecoveryAuthPublicKey(
                keys.app_recovery_auth_keypair.public_key.clone(),
            ),
        };
        let active_hw_key_bundle = HwKeyBundle {
            local_id: LocalId::derived(&[
                "hw-key-bundle",
                account_id.as_str(),
                backup.hw_auth_key.as_auth_key().as_str(),
            ]),
            spending_key: active_spending_keyset.hardware_key.clone(),
            auth_key: backup.hw_auth_key.clone(),
            network_type,
        };

        let raw_backup_for_local_storage = String::from_utf8(self.codec.encode(backup)?)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;

        info!(
            account_id = %account_id,
            keyset_id = %active_spending_keyset.keyset_id(),
            "restored account keys from backup"
        );

        Ok(AccountRestoration {
            active_spending_keyset,
            keysets,
            active_app_key_bundle,
            active_hw_key_bundle,
            account_config: backup.config.clone(),
            raw_backup_for_local_storage,
            app_global_auth_key_hw_signature: backup.app_global_auth_key_hw_signature.clone(),
        })
    }
}

impl std::fmt::Debug for KeyBackupRestorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBackupRestorer").finish_non_exhaustive()
    }
}
