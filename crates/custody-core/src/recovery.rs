//! Recovery domain types
//!
//! `Recovery` is the single authoritative view of an in-progress
//! delay-and-notify recovery. It is the join of the locally persisted
//! [`LocalRecovery`] and the last successfully fetched [`ServerRecovery`],
//! computed by [`Recovery::from_records`].

use crate::crypto::{SealedCsek, SealedSsek};
use crate::identifiers::FullAccountId;
use crate::keys::{
    AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey,
    HwAuthPublicKey, Signature,
};
use crate::keyset::{AppKeyBundle, HwKeyBundle, SpendingKeyset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An authentication/spending factor of the 2-of-3 custody model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhysicalFactor {
    /// The mobile application
    App,
    /// The hardware device
    Hardware,
}

impl fmt::Display for PhysicalFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => f.write_str("app"),
            Self::Hardware => f.write_str("hardware"),
        }
    }
}

/// Locally persisted progress of a recovery attempt.
///
/// Variants are declared in the only order they may be committed. A value may
/// be re-recorded (crash replay) but never replaced by a lower one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalRecoveryAttemptProgress {
    /// Destination keys generated and the server recovery initiated
    Initiated,
    /// Completion was attempted with these freshly sealed keys
    AttemptingCompletion {
        /// CSEK sealed by the new hardware
        sealed_csek: SealedCsek,
        /// SSEK sealed by the new hardware
        sealed_ssek: SealedSsek,
    },
    /// Fresh auth tokens were obtained and stored for the destination auth keys
    RotatedAuthKeys,
    /// The server created a keyset for the destination spending keys
    CreatedSpendingKeys {
        /// Keyset that was created
        keyset: SpendingKeyset,
    },
    /// Descriptor backups covering the new keyset were uploaded
    UploadedDescriptorBackups {
        /// Keyset the backups were extended with
        keyset: SpendingKeyset,
    },
    /// The server marked the new keyset active
    ActivatedSpendingKeys {
        /// Keyset that was activated
        keyset: SpendingKeyset,
    },
    /// A cloud backup of the new key material was written
    BackedUpToCloud {
        /// Active keyset at backup time
        keyset: SpendingKeyset,
    },
    /// Funds were swept from the previous keysets
    SweptFunds {
        /// Keyset funds were swept into
        keyset: SpendingKeyset,
    },
}

/// Step of [`LocalRecoveryAttemptProgress`] without its data, ordered by commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressStep {
    /// See [`LocalRecoveryAttemptProgress::Initiated`]
    Initiated,
    /// See [`LocalRecoveryAttemptProgress::AttemptingCompletion`]
    AttemptingCompletion,
    /// See [`LocalRecoveryAttemptProgress::RotatedAuthKeys`]
    RotatedAuthKeys,
    /// See [`LocalRecoveryAttemptProgress::CreatedSpendingKeys`]
    CreatedSpendingKeys,
    /// See [`LocalRecoveryAttemptProgress::UploadedDescriptorBackups`]
    UploadedDescriptorBackups,
    /// See [`LocalRecoveryAttemptProgress::ActivatedSpendingKeys`]
    ActivatedSpendingKeys,
    /// See [`LocalRecoveryAttemptProgress::BackedUpToCloud`]
    BackedUpToCloud,
    /// See [`LocalRecoveryAttemptProgress::SweptFunds`]
    SweptFunds,
}

impl ProgressStep {
    /// Short stable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::AttemptingCompletion => "attempting_completion",
            Self::RotatedAuthKeys => "rotated_auth_keys",
            Self::CreatedSpendingKeys => "created_spending_keys",
            Self::UploadedDescriptorBackups => "uploaded_descriptor_backups",
            Self::ActivatedSpendingKeys => "activated_spending_keys",
            Self::BackedUpToCloud => "backed_up_to_cloud",
            Self::SweptFunds => "swept_funds",
        }
    }
}

impl LocalRecoveryAttemptProgress {
    /// Step this progress value commits.
    pub fn step(&self) -> ProgressStep {
        match self {
            Self::Initiated => ProgressStep::Initiated,
            Self::AttemptingCompletion { .. } => ProgressStep::AttemptingCompletion,
            Self::RotatedAuthKeys => ProgressStep::RotatedAuthKeys,
            Self::CreatedSpendingKeys { .. } => ProgressStep::CreatedSpendingKeys,
            Self::UploadedDescriptorBackups { .. } => ProgressStep::UploadedDescriptorBackups,
            Self::ActivatedSpendingKeys { .. } => ProgressStep::ActivatedSpendingKeys,
            Self::BackedUpToCloud { .. } => ProgressStep::BackedUpToCloud,
            Self::SweptFunds { .. } => ProgressStep::SweptFunds,
        }
    }

    /// Position of this step in the commit order.
    pub fn ordinal(&self) -> u8 {
        self.step() as u8
    }

    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        self.step().name()
    }

    /// Whether this progress has reached `step`.
    pub fn has_reached(&self, step: ProgressStep) -> bool {
        self.step() >= step
    }

    /// Whether completion with the server has at least been attempted.
    pub fn has_attempted_completion(&self) -> bool {
        self.has_reached(ProgressStep::AttemptingCompletion)
    }

    /// Keyset created by this recovery, once one exists.
    pub fn spending_keyset(&self) -> Option<&SpendingKeyset> {
        match self {
            Self::CreatedSpendingKeys { keyset }
            | Self::UploadedDescriptorBackups { keyset }
            | Self::ActivatedSpendingKeys { keyset }
            | Self::BackedUpToCloud { keyset }
            | Self::SweptFunds { keyset } => Some(keyset),
            Self::Initiated | Self::AttemptingCompletion { .. } | Self::RotatedAuthKeys => None,
        }
    }

    /// Sealed keys committed when completion was attempted.
    pub fn sealed_keys(&self) -> Option<(&SealedCsek, &SealedSsek)> {
        match self {
            Self::AttemptingCompletion {
                sealed_csek,
                sealed_ssek,
            } => Some((sealed_csek, sealed_ssek)),
            _ => None,
        }
    }
}

/// Recovery initiated from this device, persisted for resumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecovery {
    /// Account being recovered
    pub full_account_id: FullAccountId,
    /// Factor being replaced
    pub lost_factor: PhysicalFactor,
    /// Destination app keys
    pub app_key_bundle: AppKeyBundle,
    /// Destination hardware keys
    pub hw_key_bundle: HwKeyBundle,
    /// Hardware signature over the destination app global auth key
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    /// Latest committed progress
    pub progress: LocalRecoveryAttemptProgress,
}

impl LocalRecovery {
    /// Destination auth keys as the server sees them.
    pub fn destination_auth_keys(&self) -> DestinationAuthKeys {
        DestinationAuthKeys {
            app_global_auth_key: self.app_key_bundle.auth_key.clone(),
            app_recovery_auth_key: self.app_key_bundle.recovery_auth_key.clone(),
            hardware_auth_key: self.hw_key_bundle.auth_key.clone(),
        }
    }
}

/// The auth keys a recovery will rotate the account to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationAuthKeys {
    /// New app global auth key
    pub app_global_auth_key: AppGlobalAuthPublicKey,
    /// New app recovery auth key
    pub app_recovery_auth_key: AppRecoveryAuthPublicKey,
    /// New hardware auth key
    pub hardware_auth_key: HwAuthPublicKey,
}

/// Server's canonical record of an active delay-and-notify recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecovery {
    /// Account under recovery
    pub full_account_id: FullAccountId,
    /// Factor being replaced
    pub lost_factor: PhysicalFactor,
    /// Unix seconds when the delay started
    pub delay_start_time: u64,
    /// Unix seconds when the delay ends
    pub delay_end_time: u64,
    /// Destination auth keys registered with the server
    pub destination_auth_keys: DestinationAuthKeys,
}

/// A recovery that belongs to this device and is still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StillRecovering {
    /// Local record, including progress
    pub local: LocalRecovery,
    /// Server record while the server still reports it
    pub server: Option<ServerRecovery>,
}

impl StillRecovering {
    /// Account under recovery.
    pub fn full_account_id(&self) -> &FullAccountId {
        &self.local.full_account_id
    }

    /// Factor being replaced.
    pub fn factor_to_recover(&self) -> PhysicalFactor {
        self.local.lost_factor
    }

    /// Latest committed progress.
    pub fn progress(&self) -> &LocalRecoveryAttemptProgress {
        &self.local.progress
    }

    /// Seconds left in the delay period, zero once complete or unknown.
    pub fn delay_remaining(&self, now_secs: u64) -> u64 {
        self.server
            .as_ref()
            .map(|server| server.delay_end_time.saturating_sub(now_secs))
            .unwrap_or(0)
    }

    /// Whether the delay period has elapsed.
    pub fn is_delay_complete(&self, now_secs: u64) -> bool {
        self.delay_remaining(now_secs) == 0
    }
}

/// Current state of account recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recovery {
    /// Nothing has been resolved yet
    Loading,
    /// No recovery exists locally or on the server
    NoActiveRecovery,
    /// This device's recovery is in progress
    StillRecovering(Box<StillRecovering>),
    /// The server reports a recovery this device did not initiate
    SomeoneElseIsRecovering {
        /// Factor the other party is replacing
        factor_being_recovered: PhysicalFactor,
    },
    /// This device started a recovery that was cancelled elsewhere
    NoLongerRecovering {
        /// Factor the cancelled recovery was replacing
        cancelled_factor: PhysicalFactor,
    },
}

impl Recovery {
    /// Join local progress with the last known server record.
    pub fn from_records(local: Option<LocalRecovery>, server: Option<ServerRecovery>) -> Self {
        match (local, server) {
            (None, None) => Recovery::NoActiveRecovery,
            (None, Some(server)) => Recovery::SomeoneElseIsRecovering {
                factor_being_recovered: server.lost_factor,
            },
            (Some(local), Some(server)) => {
                if server.destination_auth_keys == local.destination_auth_keys() {
                    Recovery::StillRecovering(Box::new(StillRecovering {
                        local,
                        server: Some(server),
                    }))
                } else {
                    Recovery::SomeoneElseIsRecovering {
                        factor_being_recovered: server.lost_factor,
                    }
                }
            }
            (Some(local), None) => {
                // Once completion has been attempted the server drops its record,
                // so absence no longer means cancellation.
                if local.progress.has_attempted_completion() {
                    Recovery::StillRecovering(Box::new(StillRecovering {
                        local,
                        server: None,
                    }))
                } else {
                    Recovery::NoLongerRecovering {
                        cancelled_factor: local.lost_factor,
                    }
                }
            }
        }
    }

    /// The in-flight recovery, if this device owns one.
    pub fn still_recovering(&self) -> Option<&StillRecovering> {
        match self {
            Recovery::StillRecovering(recovery) => Some(&**recovery),
            _ => None,
        }
    }

    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Recovery::Loading => "loading",
            Recovery::NoActiveRecovery => "no_active_recovery",
            Recovery::StillRecovering(_) => "still_recovering",
            Recovery::SomeoneElseIsRecovering { .. } => "someone_else_is_recovering",
            Recovery::NoLongerRecovering { .. } => "no_longer_recovering",
        }
    }
}

const COMPLETE_DELAY_NOTIFY_TAG: &str = "CompleteDelayNotify";

/// Canonical challenge signed by both factors to complete a recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteDelayNotifyChallenge {
    /// Factor being replaced
    pub lost_factor: PhysicalFactor,
    bytes: Vec<u8>,
}

impl CompleteDelayNotifyChallenge {
    /// Build the challenge for the given destination keys.
    ///
    /// Key order depends on the lost factor: the surviving factor's key leads.
    pub fn new(lost_factor: PhysicalFactor, keys: &DestinationAuthKeys) -> Self {
        let hw = keys.hardware_auth_key.to_string();
        let app = keys.app_global_auth_key.to_string();
        let recovery = keys.app_recovery_auth_key.to_string();
        let body = match lost_factor {
            PhysicalFactor::App => format!("{COMPLETE_DELAY_NOTIFY_TAG}{hw}{app}{recovery}"),
            PhysicalFactor::Hardware => format!("{COMPLETE_DELAY_NOTIFY_TAG}{app}{hw}{recovery}"),
        };
        Self {
            lost_factor,
            bytes: body.into_bytes(),
        }
    }

    /// Bytes to sign.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A completion challenge together with the signature of one factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignedChallenge {
    /// Signed with the app global auth key
    AppSigned {
        /// Challenge
        challenge: CompleteDelayNotifyChallenge,
        /// App signature
        signature: Signature,
    },
    /// Signed by the hardware device
    HardwareSigned {
        /// Challenge
        challenge: CompleteDelayNotifyChallenge,
        /// Hardware signature
        signature: Signature,
    },
}

impl SignedChallenge {
    /// Factor that produced the signature.
    pub fn signer(&self) -> PhysicalFactor {
        match self {
            SignedChallenge::AppSigned { .. } => PhysicalFactor::App,
            SignedChallenge::HardwareSigned { .. } => PhysicalFactor::Hardware,
        }
    }

    /// The signed challenge.
    pub fn challenge(&self) -> &CompleteDelayNotifyChallenge {
        match self {
            SignedChallenge::AppSigned { challenge, .. }
            | SignedChallenge::HardwareSigned { challenge, .. } => challenge,
        }
    }

    /// The signature.
    pub fn signature(&self) -> &Signature {
        match self {
            SignedChallenge::AppSigned { signature, .. }
            | SignedChallenge::HardwareSigned { signature, .. } => signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::LocalId;
    use crate::keys::{AppSpendingPublicKey, HwSpendingPublicKey};
    use crate::keyset::BitcoinNetworkType;

    fn local(progress: LocalRecoveryAttemptProgress) -> LocalRecovery {
        LocalRecovery {
            full_account_id: FullAccountId::new("acct"),
            lost_factor: PhysicalFactor::Hardware,
            app_key_bundle: AppKeyBundle {
                local_id: LocalId::derived(&["app"]),
                spending_key: AppSpendingPublicKey::new("[00000000/84'/1'/0']tpubapp/*"),
                auth_key: AppGlobalAuthPublicKey::new("02app"),
                network_type: BitcoinNetworkType::Signet,
                recovery_auth_key: AppRecoveryAuthPublicKey::new("02rec"),
            },
            hw_key_bundle: HwKeyBundle {
                local_id: LocalId::derived(&["hw"]),
                spending_key: HwSpendingPublicKey::new("[11111111/84'/1'/0']tpubhw/*"),
                auth_key: HwAuthPublicKey::new("02hw"),
                network_type: BitcoinNetworkType::Signet,
            },
            app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature::new("3044"),
            progress,
        }
    }

    fn keyset() -> SpendingKeyset {
        let keyset_id = crate::identifiers::ServerKeysetId::new("keyset-1");
        SpendingKeyset {
            local_id: SpendingKeyset::derived_local_id(&keyset_id),
            network_type: BitcoinNetworkType::Signet,
            app_key: AppSpendingPublicKey::new("[00000000/84'/1'/0']tpubapp/*"),
            hardware_key: HwSpendingPublicKey::new("[11111111/84'/1'/0']tpubhw/*"),
            server_keyset: crate::keyset::ServerKeyset {
                keyset_id,
                server_public_key: crate::keys::ServerSpendingPublicKey::new(
                    "[22222222/84'/1'/0']tpubserver/*",
                ),
            },
        }
    }

    fn server_for(local: &LocalRecovery) -> ServerRecovery {
        ServerRecovery {
            full_account_id: local.full_account_id.clone(),
            lost_factor: local.lost_factor,
            delay_start_time: 100,
            delay_end_time: 200,
            destination_auth_keys: local.destination_auth_keys(),
        }
    }

    #[test]
    fn merge_matching_records_is_still_recovering() {
        let local = local(LocalRecoveryAttemptProgress::Initiated);
        let server = server_for(&local);
        let recovery = Recovery::from_records(Some(local), Some(server));
        let still = recovery.still_recovering().unwrap();
        assert_eq!(still.delay_remaining(150), 50);
        assert!(still.is_delay_complete(250));
    }

    #[test]
    fn merge_mismatched_keys_is_someone_else() {
        let local = local(LocalRecoveryAttemptProgress::Initiated);
        let mut server = server_for(&local);
        server.destination_auth_keys.hardware_auth_key = HwAuthPublicKey::new("02other");
        assert_eq!(
            Recovery::from_records(Some(local), Some(server)),
            Recovery::SomeoneElseIsRecovering {
                factor_being_recovered: PhysicalFactor::Hardware
            }
        );
    }

    #[test]
    fn merge_missing_server_before_completion_is_cancelled() {
        let local = local(LocalRecoveryAttemptProgress::Initiated);
        assert_eq!(
            Recovery::from_records(Some(local), None),
            Recovery::NoLongerRecovering {
                cancelled_factor: PhysicalFactor::Hardware
            }
        );
    }

    #[test]
    fn merge_missing_server_after_completion_attempt_keeps_recovering() {
        let local = local(LocalRecoveryAttemptProgress::RotatedAuthKeys);
        assert!(Recovery::from_records(Some(local), None)
            .still_recovering()
            .is_some());
    }

    #[test]
    fn progress_ordinals_are_strictly_increasing() {
        let steps = [
            LocalRecoveryAttemptProgress::Initiated,
            LocalRecoveryAttemptProgress::AttemptingCompletion {
                sealed_csek: SealedCsek::new(vec![1]),
                sealed_ssek: SealedSsek::new(vec![2]),
            },
            LocalRecoveryAttemptProgress::RotatedAuthKeys,
            LocalRecoveryAttemptProgress::UploadedDescriptorBackups {
                keyset: keyset(),
            },
            LocalRecoveryAttemptProgress::BackedUpToCloud { keyset: keyset() },
        ];
        assert!(steps.windows(2).all(|w| w[0].ordinal() < w[1].ordinal()));
        assert!(steps[..3].iter().all(|step| step.spending_keyset().is_none()));
        assert_eq!(steps[4].spending_keyset(), Some(&keyset()));
    }

    #[test]
    fn challenge_key_order_depends_on_lost_factor() {
        let keys = local(LocalRecoveryAttemptProgress::Initiated).destination_auth_keys();
        let lost_app = CompleteDelayNotifyChallenge::new(PhysicalFactor::App, &keys);
        let lost_hw = CompleteDelayNotifyChallenge::new(PhysicalFactor::Hardware, &keys);
        assert_eq!(lost_app.as_bytes(), b"CompleteDelayNotify02hw02app02rec");
        assert_eq!(lost_hw.as_bytes(), b"CompleteDelayNotify02app02hw02rec");
    }
}
