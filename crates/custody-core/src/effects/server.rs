//! Backend ("f8e") recovery and keyset endpoints

use crate::crypto::SealedSsek;
use crate::identifiers::{FullAccountId, ServerKeysetId};
use crate::keys::{
    AppGlobalAuthPublicKey, AppSpendingPublicKey, HwFactorProofOfPossession, HwSpendingPublicKey,
    Signature,
};
use crate::keyset::{BitcoinNetworkType, DescriptorBackup, ServerKeyset, SpendingKeyset, WalletKind};
use crate::recovery::{CompleteDelayNotifyChallenge, ServerRecovery};
use crate::CustodyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Delay-and-notify endpoints.
#[async_trait]
pub trait RecoveryServer: Send + Sync {
    /// Active recovery for the account, if any.
    async fn recovery_status(&self, account_id: &FullAccountId)
        -> CustodyResult<Option<ServerRecovery>>;

    /// Cancel the active recovery. Fails with `NotFound` when there is none.
    async fn cancel_recovery(&self, account_id: &FullAccountId) -> CustodyResult<()>;

    /// Complete the delay period, rotating the account to the destination auth keys.
    async fn complete_recovery(
        &self,
        account_id: &FullAccountId,
        challenge: &CompleteDelayNotifyChallenge,
        app_signature: &Signature,
        hardware_signature: &Signature,
    ) -> CustodyResult<()>;
}

/// Input for keyset creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeysetRequest {
    /// Account receiving the keyset
    pub account_id: FullAccountId,
    /// Network
    pub network: BitcoinNetworkType,
    /// App spending key of the new keyset
    pub app_spending_key: AppSpendingPublicKey,
    /// Hardware spending key of the new keyset
    pub hardware_spending_key: HwSpendingPublicKey,
}

/// Keyset listing, with the descriptor backups the server holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListKeysetsResponse {
    /// All keysets, oldest first
    pub keysets: Vec<SpendingKeyset>,
    /// Kind of the account's wallet
    pub wallet_kind: WalletKind,
    /// SSEK-sealed descriptors
    pub descriptor_backups: Vec<DescriptorBackup>,
    /// Hardware-sealed SSEK the descriptors are encrypted with
    pub wrapped_ssek: Option<SealedSsek>,
}

/// Keyset endpoints.
#[async_trait]
pub trait KeysetServer: Send + Sync {
    /// List keysets and descriptor backups.
    async fn list_keysets(&self, account_id: &FullAccountId) -> CustodyResult<ListKeysetsResponse>;

    /// Create a legacy keyset.
    async fn create_keyset(&self, request: &CreateKeysetRequest) -> CustodyResult<ServerKeyset>;

    /// Create a private (delegated) keyset.
    async fn create_private_keyset(
        &self,
        request: &CreateKeysetRequest,
    ) -> CustodyResult<ServerKeyset>;

    /// Mark a keyset active.
    async fn activate_keyset(
        &self,
        account_id: &FullAccountId,
        keyset_id: &ServerKeysetId,
    ) -> CustodyResult<()>;

    /// Replace the stored descriptor backups with `backups`.
    async fn update_descriptor_backups(
        &self,
        account_id: &FullAccountId,
        backups: &[DescriptorBackup],
        sealed_ssek: &SealedSsek,
        app_auth_key: &AppGlobalAuthPublicKey,
        hw_proof_of_possession: Option<&HwFactorProofOfPossession>,
    ) -> CustodyResult<()>;
}
