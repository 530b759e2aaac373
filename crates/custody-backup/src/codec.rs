//! Versioned cloud backup codec
//!
//! A backup is a JSON envelope carrying a hardware-sealed CSEK and the full
//! account key bundle sealed under that CSEK. All versions decode through the
//! same structs; version differences are confined to field defaulting:
//!
//! - `keysets` may be absent (older payloads) and defaults to empty
//! - a retired `inactiveSpendingKeysets` field is ignored
//!
//! Private keys only ever travel inside the sealed bundle. An envelope that
//! carries a delegated-decryption keypair in the clear is rejected on decode.
//!
//! [`BackupCodec::seal`] always writes the current version.

use custody_core::effects::SymmetricKeyEncryptor;
use custody_core::{
    AppAuthKeypair, AppGlobalAuthKeyHwSignature, AppSpendingKeypair, AppSpendingPublicKey,
    BitcoinNetworkType, Csek, DelegatedDecryptionKeypair, FullAccountConfig, FullAccountId,
    HwAuthPublicKey, HwSpendingPublicKey, SealedCsek, SealedData, ServerKeyset,
    ServerKeysetId, ServerSpendingPublicKey, SpendingKeyset,
};
use custody_crypto::{AccountKeysPurpose, SealedEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::CodecError;

/// Version written by [`BackupCodec::seal`].
pub const CURRENT_BACKUP_VERSION: u32 = 3;

/// Envelope field under which some writers left the delegated-decryption
/// keypair unsealed.
const PLAINTEXT_DELEGATED_KEYPAIR: &str = "delegatedDecryptionKeypair";

/// Supported envelope versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupVersion {
    /// First supported format
    V2,
    /// Current format
    V3,
    /// A newer version; decoded with V3 rules
    Future(u32),
}

impl BackupVersion {
    /// Classify a wire version number.
    pub fn from_number(number: u32) -> Result<Self, CodecError> {
        match number {
            0 | 1 => Err(CodecError::UnsupportedVersion(number)),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            n => Ok(Self::Future(n)),
        }
    }

    /// Wire version number.
    pub fn number(self) -> u32 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
            Self::Future(n) => n,
        }
    }
}

/// Cloud backup envelope as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedBackup {
    /// Wire version number
    pub version: u32,
    /// Account the backup belongs to
    pub account_id: FullAccountId,
    /// CSEK sealed by the hardware
    pub sealed_csek: SealedCsek,
    /// [`FullAccountKeys`] JSON sealed with the CSEK
    pub sealed_account_keys: SealedData,
    /// Hardware auth key
    pub hw_auth_key: HwAuthPublicKey,
    /// Hardware signature over the app global auth key
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    /// Account configuration
    #[serde(default)]
    pub config: FullAccountConfig,
}

impl VersionedBackup {
    /// Classified version.
    pub fn backup_version(&self) -> Result<BackupVersion, CodecError> {
        BackupVersion::from_number(self.version)
    }
}

/// Keyset as stored in a backup. Local ids are not stored; they are derived
/// on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupKeyset {
    /// Server keyset id
    pub keyset_id: ServerKeysetId,
    /// Network
    pub network_type: BitcoinNetworkType,
    /// App spending key
    pub app_key: AppSpendingPublicKey,
    /// Hardware spending key
    pub hardware_key: HwSpendingPublicKey,
    /// Server spending key
    pub server_key: ServerSpendingPublicKey,
}

impl BackupKeyset {
    /// Strip local identity from a keyset.
    pub fn from_keyset(keyset: &SpendingKeyset) -> Self {
        Self {
            keyset_id: keyset.server_keyset.keyset_id.clone(),
            network_type: keyset.network_type,
            app_key: keyset.app_key.clone(),
            hardware_key: keyset.hardware_key.clone(),
            server_key: keyset.server_keyset.server_public_key.clone(),
        }
    }

    /// Rebuild the keyset with a local id derived from its keyset id.
    pub fn to_keyset(&self) -> SpendingKeyset {
        SpendingKeyset {
            local_id: SpendingKeyset::derived_local_id(&self.keyset_id),
            network_type: self.network_type,
            app_key: self.app_key.clone(),
            hardware_key: self.hardware_key.clone(),
            server_keyset: ServerKeyset {
                keyset_id: self.keyset_id.clone(),
                server_public_key: self.server_key.clone(),
            },
        }
    }
}

/// Key bundle sealed inside the backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullAccountKeys {
    /// Active keyset
    pub active_spending_keyset: BackupKeyset,
    /// Every keyset known at backup time
    #[serde(default)]
    pub keysets: Vec<BackupKeyset>,
    /// App spending keypair of the active keyset
    pub app_spending_keypair: AppSpendingKeypair,
    /// App global auth keypair
    pub app_global_auth_keypair: AppAuthKeypair,
    /// App recovery auth keypair
    pub app_recovery_auth_keypair: AppAuthKeypair,
    /// Delegated-decryption keypair, when the account has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_decryption_keypair: Option<DelegatedDecryptionKeypair>,
}

/// Unsealed bundle with version quirks resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAccountKeys {
    /// Version the backup was written with
    pub version: BackupVersion,
    /// Keys from the sealed bundle
    pub keys: FullAccountKeys,
}

/// Encodes and decodes cloud backups.
#[derive(Clone)]
pub struct BackupCodec {
    encryptor: Arc<dyn SymmetricKeyEncryptor>,
}

impl BackupCodec {
    /// Create a codec sealing with `encryptor`.
    pub fn new(encryptor: Arc<dyn SymmetricKeyEncryptor>) -> Self {
        Self { encryptor }
    }

    /// Parse an envelope, rejecting unsupported versions and envelopes that
    /// carry private key material outside the sealed bundle.
    pub fn decode(&self, bytes: &[u8]) -> Result<VersionedBackup, CodecError> {
        let envelope: serde_json::Value = serde_json::from_slice(bytes)?;
        if envelope.get(PLAINTEXT_DELEGATED_KEYPAIR).is_some() {
            warn!("backup envelope carries an unsealed delegated decryption keypair");
            return Err(CodecError::PlaintextKeyMaterial(PLAINTEXT_DELEGATED_KEYPAIR));
        }
        let backup: VersionedBackup = serde_json::from_value(envelope)?;
        backup.backup_version()?;
        Ok(backup)
    }

    /// Serialize an envelope.
    pub fn encode(&self, backup: &VersionedBackup) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(backup)?)
    }

    /// Build a current-version backup of `keys`.
    #[allow(clippy::too_many_arguments)]
    pub fn seal(
        &self,
        account_id: &FullAccountId,
        keys: &FullAccountKeys,
        csek: &Csek,
        sealed_csek: &SealedCsek,
        hw_auth_key: &HwAuthPublicKey,
        app_global_auth_key_hw_signature: &AppGlobalAuthKeyHwSignature,
        config: &FullAccountConfig,
    ) -> Result<VersionedBackup, CodecError> {
        let envelope =
            SealedEnvelope::<AccountKeysPurpose>::seal_json(self.encryptor.as_ref(), csek, keys)
                .map_err(|e| CodecError::Malformed(e.to_string()))?;

        Ok(VersionedBackup {
            version: CURRENT_BACKUP_VERSION,
            account_id: account_id.clone(),
            sealed_csek: sealed_csek.clone(),
            sealed_account_keys: envelope.into_data(),
            hw_auth_key: hw_auth_key.clone(),
            app_global_auth_key_hw_signature: app_global_auth_key_hw_signature.clone(),
            config: config.clone(),
        })
    }

    /// Unseal and decode the key bundle of `backup`.
    pub fn open_account_keys(
        &self,
        backup: &VersionedBackup,
        csek: &Csek,
    ) -> Result<DecodedAccountKeys, CodecError> {
        let version = backup.backup_version()?;
        let envelope =
            SealedEnvelope::<AccountKeysPurpose>::from_data(backup.sealed_account_keys.clone());
        let plaintext = Zeroizing::new(
            envelope
                .open(self.encryptor.as_ref(), csek)
                .map_err(|e| CodecError::Decryption(e.to_string()))?,
        );
        let keys: FullAccountKeys = serde_json::from_slice(&plaintext)?;
        Ok(DecodedAccountKeys { version, keys })
    }
}

impl std::fmt::Debug for BackupCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCodec").finish_non_exhaustive()
    }
}
