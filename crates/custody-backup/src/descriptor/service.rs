//! Descriptor backup service
//!
//! Seals one watching descriptor per keyset under the SSEK and keeps the
//! server's descriptor record complete: every upload replaces the full set.
//!
//! During recovery the set to upload depends on the lost factor:
//!
//! - **Hardware lost**: the old SSEK died with the device, so every keyset is
//!   re-encrypted under the new SSEK. The local keyset list is used when it is
//!   authoritative, otherwise the server's list.
//! - **App lost**: the surviving hardware can still unseal the existing SSEK,
//!   so the existing descriptors are decrypted and extended.

use custody_core::effects::{
    HardwareTransport, KeyboxStore, KeysetServer, SsekStore, SymmetricKeyEncryptor,
};
use custody_core::{
    run_until_cancelled, AppGlobalAuthPublicKey, BitcoinNetworkType, CancellationToken,
    DescriptorBackup, FullAccountId, HwFactorProofOfPossession, PhysicalFactor, SealedSsek,
    ServerKeyset, SpendingKeyset, Ssek,
};
use custody_crypto::{generate_symmetric_key, DescriptorPurpose, SealedEnvelope};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::grammar::{build_descriptor, parse_descriptor};
use crate::error::DescriptorBackupError;

/// What is already in hand before a descriptor backup round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorBackupPreparedData {
    /// Nothing to decrypt; seal these keysets under the new SSEK
    EncryptOnly {
        /// Keysets to seal
        keysets_to_encrypt: Vec<SpendingKeyset>,
    },
    /// Existing descriptors can be decrypted with a locally available SSEK
    Available {
        /// Existing sealed descriptors
        descriptors_to_decrypt: Vec<DescriptorBackup>,
        /// Keysets to add
        keysets_to_encrypt: Vec<SpendingKeyset>,
        /// SSEK the existing descriptors are sealed with
        sealed_ssek: SealedSsek,
    },
    /// Existing descriptors need a hardware unseal of `sealed_ssek` first
    NeedsUnsealed {
        /// Existing sealed descriptors
        descriptors_to_decrypt: Vec<DescriptorBackup>,
        /// Keysets to add
        keysets_to_encrypt: Vec<SpendingKeyset>,
        /// SSEK the existing descriptors are sealed with
        sealed_ssek: SealedSsek,
    },
}

/// Seals, unseals and uploads descriptor backups.
#[derive(Clone)]
pub struct DescriptorBackupService {
    keyset_server: Arc<dyn KeysetServer>,
    keybox_store: Arc<dyn KeyboxStore>,
    ssek_store: Arc<dyn SsekStore>,
    encryptor: Arc<dyn SymmetricKeyEncryptor>,
    network: BitcoinNetworkType,
}

impl DescriptorBackupService {
    /// Create a service for keysets on `network`.
    ///
    /// The sealed descriptor does not record a network, so one service only
    /// seals keysets on `network` and tags every unsealed keyset with it.
    pub fn new(
        keyset_server: Arc<dyn KeysetServer>,
        keybox_store: Arc<dyn KeyboxStore>,
        ssek_store: Arc<dyn SsekStore>,
        encryptor: Arc<dyn SymmetricKeyEncryptor>,
        network: BitcoinNetworkType,
    ) -> Self {
        Self {
            keyset_server,
            keybox_store,
            ssek_store,
            encryptor,
            network,
        }
    }

    async fn ssek(&self, sealed_ssek: &SealedSsek) -> Result<Ssek, DescriptorBackupError> {
        self.ssek_store
            .get(sealed_ssek)
            .await
            .map_err(DescriptorBackupError::at("ssek_store.get"))?
            .ok_or(DescriptorBackupError::SsekNotFound)
    }

    /// Seal the watching descriptor of each keyset, in order.
    ///
    /// Keysets on another network than the service's are rejected before
    /// anything is sealed.
    pub async fn seal_descriptors(
        &self,
        sealed_ssek: &SealedSsek,
        keysets: &[SpendingKeyset],
    ) -> Result<Vec<DescriptorBackup>, DescriptorBackupError> {
        if let Some(keyset) = keysets.iter().find(|k| k.network_type != self.network) {
            return Err(DescriptorBackupError::NetworkMismatch {
                keyset_id: keyset.keyset_id().clone(),
                expected: self.network,
                found: keyset.network_type,
            });
        }
        let ssek = self.ssek(sealed_ssek).await?;
        keysets
            .iter()
            .map(|keyset| {
                let descriptor = build_descriptor(keyset);
                let envelope = SealedEnvelope::<DescriptorPurpose>::seal(
                    self.encryptor.as_ref(),
                    &ssek,
                    descriptor.as_bytes(),
                )
                .map_err(DescriptorBackupError::at("seal_descriptor"))?;
                Ok(DescriptorBackup {
                    keyset_id: keyset.keyset_id().clone(),
                    sealed_descriptor: envelope.into_data(),
                })
            })
            .collect()
    }

    /// Decrypt and parse each descriptor back into a keyset, in order. Keysets
    /// are tagged with the service's network.
    pub async fn unseal_descriptors(
        &self,
        sealed_ssek: &SealedSsek,
        backups: &[DescriptorBackup],
    ) -> Result<Vec<SpendingKeyset>, DescriptorBackupError> {
        let ssek = self.ssek(sealed_ssek).await?;
        backups
            .iter()
            .map(|backup| {
                let envelope =
                    SealedEnvelope::<DescriptorPurpose>::from_data(backup.sealed_descriptor.clone());
                let plaintext = envelope.open(self.encryptor.as_ref(), &ssek).map_err(|e| {
                    DescriptorBackupError::decryption(format!("keyset {}: {e}", backup.keyset_id))
                })?;
                let descriptor = String::from_utf8(plaintext).map_err(|_| {
                    DescriptorBackupError::decryption(format!(
                        "keyset {}: descriptor is not UTF-8",
                        backup.keyset_id
                    ))
                })?;
                let keys = parse_descriptor(&descriptor)?;
                Ok(SpendingKeyset {
                    local_id: SpendingKeyset::derived_local_id(&backup.keyset_id),
                    network_type: self.network,
                    app_key: keys.app,
                    hardware_key: keys.hardware,
                    server_keyset: ServerKeyset {
                        keyset_id: backup.keyset_id.clone(),
                        server_public_key: keys.server,
                    },
                })
            })
            .collect()
    }

    /// Work out what a recovery's descriptor upload needs.
    pub async fn prepare_descriptor_backups_for_recovery(
        &self,
        account_id: &FullAccountId,
        factor_to_recover: PhysicalFactor,
        new_keyset: &SpendingKeyset,
    ) -> Result<DescriptorBackupPreparedData, DescriptorBackupError> {
        match factor_to_recover {
            PhysicalFactor::Hardware => {
                let keybox = self
                    .keybox_store
                    .active_keybox()
                    .await
                    .map_err(DescriptorBackupError::at("active_keybox"))?;

                let known = match keybox {
                    Some(keybox) if keybox.can_use_keyset_list => {
                        debug!(%account_id, "using local keyset list");
                        keybox.keysets
                    }
                    _ => {
                        debug!(%account_id, "local keyset list not authoritative, fetching from server");
                        self.keyset_server
                            .list_keysets(account_id)
                            .await
                            .map_err(DescriptorBackupError::at("list_keysets"))?
                            .keysets
                    }
                };

                Ok(DescriptorBackupPreparedData::EncryptOnly {
                    keysets_to_encrypt: combine_keysets(known, std::slice::from_ref(new_keyset)),
                })
            }
            PhysicalFactor::App => {
                let response = self
                    .keyset_server
                    .list_keysets(account_id)
                    .await
                    .map_err(DescriptorBackupError::at("list_keysets"))?;

                match (response.descriptor_backups.is_empty(), response.wrapped_ssek) {
                    (true, None) => {
                        let most_recent = response
                            .keysets
                            .last()
                            .cloned()
                            .unwrap_or_else(|| new_keyset.clone());
                        debug!(%account_id, keyset_id = %most_recent.keyset_id(), "no descriptor backups yet");
                        Ok(DescriptorBackupPreparedData::EncryptOnly {
                            keysets_to_encrypt: vec![most_recent],
                        })
                    }
                    (false, Some(sealed_ssek)) => {
                        let available = self
                            .ssek_store
                            .get(&sealed_ssek)
                            .await
                            .map_err(DescriptorBackupError::at("ssek_store.get"))?
                            .is_some();
                        let descriptors_to_decrypt = response.descriptor_backups;
                        let keysets_to_encrypt = vec![new_keyset.clone()];
                        debug!(%account_id, available, "existing descriptor backups found");
                        Ok(if available {
                            DescriptorBackupPreparedData::Available {
                                descriptors_to_decrypt,
                                keysets_to_encrypt,
                                sealed_ssek,
                            }
                        } else {
                            DescriptorBackupPreparedData::NeedsUnsealed {
                                descriptors_to_decrypt,
                                keysets_to_encrypt,
                                sealed_ssek,
                            }
                        })
                    }
                    (has_no_descriptors, _) => Err(DescriptorBackupError::decryption(format!(
                        "server returned {} descriptor backups without a matching wrapped SSEK",
                        if has_no_descriptors { "no" } else { "existing" }
                    ))),
                }
            }
        }
    }

    /// Decrypt what exists, add the new keysets, and upload the complete set.
    ///
    /// `new_sealed_ssek` is used when nothing needs decrypting. Returns the
    /// keysets covered by the uploaded backups.
    pub async fn upload_descriptor_backups(
        &self,
        account_id: &FullAccountId,
        prepared: &DescriptorBackupPreparedData,
        new_sealed_ssek: &SealedSsek,
        app_auth_key: &AppGlobalAuthPublicKey,
        hw_proof_of_possession: Option<&HwFactorProofOfPossession>,
    ) -> Result<Vec<SpendingKeyset>, DescriptorBackupError> {
        let (keysets, sealed_ssek) = match prepared {
            DescriptorBackupPreparedData::EncryptOnly { keysets_to_encrypt } => {
                (keysets_to_encrypt.clone(), new_sealed_ssek)
            }
            DescriptorBackupPreparedData::Available {
                descriptors_to_decrypt,
                keysets_to_encrypt,
                sealed_ssek,
            } => {
                let existing = self
                    .unseal_descriptors(sealed_ssek, descriptors_to_decrypt)
                    .await?;
                (combine_keysets(existing, keysets_to_encrypt), sealed_ssek)
            }
            DescriptorBackupPreparedData::NeedsUnsealed { .. } => {
                return Err(DescriptorBackupError::SsekNotFound);
            }
        };

        let backups = self.seal_descriptors(sealed_ssek, &keysets).await?;
        self.keyset_server
            .update_descriptor_backups(
                account_id,
                &backups,
                sealed_ssek,
                app_auth_key,
                hw_proof_of_possession,
            )
            .await
            .map_err(DescriptorBackupError::at("update_descriptor_backups"))?;

        info!(%account_id, count = backups.len(), "uploaded descriptor backups");
        Ok(keysets)
    }

    /// Upload the first descriptor backup of a new account.
    pub async fn upload_onboarding_descriptor_backup(
        &self,
        account_id: &FullAccountId,
        sealed_ssek: &SealedSsek,
        keyset: &SpendingKeyset,
        app_auth_key: &AppGlobalAuthPublicKey,
        hw_proof_of_possession: &HwFactorProofOfPossession,
    ) -> Result<(), DescriptorBackupError> {
        let prepared = DescriptorBackupPreparedData::EncryptOnly {
            keysets_to_encrypt: vec![keyset.clone()],
        };
        self.upload_descriptor_backups(
            account_id,
            &prepared,
            sealed_ssek,
            app_auth_key,
            Some(hw_proof_of_possession),
        )
        .await
        .map(|_| ())
    }

    /// Unseal `sealed_ssek` with the hardware and remember the pair.
    pub async fn unseal_ssek_with_hardware(
        &self,
        sealed_ssek: &SealedSsek,
        hardware: &dyn HardwareTransport,
        token: &CancellationToken,
    ) -> Result<Ssek, DescriptorBackupError> {
        let key = run_until_cancelled(token, hardware.unseal_key(sealed_ssek.sealed_key()))
            .await
            .map_err(DescriptorBackupError::at("hardware.unseal_key"))?;
        let ssek = Ssek(key);
        self.ssek_store
            .set(sealed_ssek, ssek.clone())
            .await
            .map_err(DescriptorBackupError::at("ssek_store.set"))?;
        Ok(ssek)
    }

    /// Create a fresh SSEK, have the hardware seal it, and remember the pair.
    pub async fn generate_ssek(
        &self,
        hardware: &dyn HardwareTransport,
        token: &CancellationToken,
    ) -> Result<SealedSsek, DescriptorBackupError> {
        let ssek = Ssek(generate_symmetric_key());
        let sealed = run_until_cancelled(token, hardware.seal_key(ssek.key()))
            .await
            .map_err(DescriptorBackupError::at("hardware.seal_key"))?;
        let sealed_ssek = SealedSsek(sealed);
        self.ssek_store
            .set(&sealed_ssek, ssek)
            .await
            .map_err(DescriptorBackupError::at("ssek_store.set"))?;
        Ok(sealed_ssek)
    }
}

impl std::fmt::Debug for DescriptorBackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorBackupService")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// `existing` followed by `additional`, dropping repeated keyset ids.
fn combine_keysets(
    existing: Vec<SpendingKeyset>,
    additional: &[SpendingKeyset],
) -> Vec<SpendingKeyset> {
    let mut seen = HashSet::new();
    existing
        .into_iter()
        .chain(additional.iter().cloned())
        .filter(|keyset| seen.insert(keyset.keyset_id().clone()))
        .collect()
}
