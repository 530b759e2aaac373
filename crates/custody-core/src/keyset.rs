//! Spending keysets, key bundles and the keybox
//!
//! A wallet has exactly one active [`SpendingKeyset`] and zero or more
//! historical ones. Identity is the local id; the server keyset id is unique
//! per server.

use crate::crypto::SealedData;
use crate::identifiers::{FullAccountId, LocalId, ServerKeysetId};
use crate::keys::{
    AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey,
    AppSpendingPublicKey, HwAuthPublicKey, HwSpendingPublicKey, ServerSpendingPublicKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitcoin network a keyset spends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BitcoinNetworkType {
    /// Mainnet
    #[default]
    Bitcoin,
    /// Testnet3
    Testnet,
    /// Signet
    Signet,
    /// Local regtest
    Regtest,
}

impl fmt::Display for BitcoinNetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bitcoin => "bitcoin",
            Self::Testnet => "testnet",
            Self::Signet => "signet",
            Self::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Server half of a keyset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerKeyset {
    /// Server-issued keyset id
    pub keyset_id: ServerKeysetId,
    /// Server spending key as embedded in descriptors
    pub server_public_key: ServerSpendingPublicKey,
}

/// One generation of spending authority: app, hardware and server keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingKeyset {
    /// Local identity of the keyset
    pub local_id: LocalId,
    /// Network the keyset spends on
    pub network_type: BitcoinNetworkType,
    /// App spending key
    pub app_key: AppSpendingPublicKey,
    /// Hardware spending key
    pub hardware_key: HwSpendingPublicKey,
    /// Server keyset id and key
    pub server_keyset: ServerKeyset,
}

impl SpendingKeyset {
    /// Server keyset id shortcut.
    pub fn keyset_id(&self) -> &ServerKeysetId {
        &self.server_keyset.keyset_id
    }

    /// Local id for a keyset rebuilt from server or backup data.
    ///
    /// Keyset ids are unique per server, so the same keyset always rebuilds
    /// with the same local id.
    pub fn derived_local_id(keyset_id: &ServerKeysetId) -> LocalId {
        LocalId::derived(&["spending-keyset", keyset_id.as_str()])
    }
}

/// How the server holds its spending key for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletKind {
    /// Server key visible to the server in the clear.
    #[default]
    Legacy,
    /// Server key derived through delegation so the server cannot link spends.
    Private,
}

/// App-side keys for one account generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKeyBundle {
    /// Local identity of the bundle
    pub local_id: LocalId,
    /// App spending key
    pub spending_key: AppSpendingPublicKey,
    /// App global auth key
    pub auth_key: AppGlobalAuthPublicKey,
    /// Network
    pub network_type: BitcoinNetworkType,
    /// App recovery-scoped auth key
    pub recovery_auth_key: AppRecoveryAuthPublicKey,
}

/// Hardware-side keys for one account generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HwKeyBundle {
    /// Local identity of the bundle
    pub local_id: LocalId,
    /// Hardware spending key
    pub spending_key: HwSpendingPublicKey,
    /// Hardware auth key
    pub auth_key: HwAuthPublicKey,
    /// Network
    pub network_type: BitcoinNetworkType,
}

/// Account-level configuration carried through backups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullAccountConfig {
    /// Network of the account
    pub bitcoin_network_type: BitcoinNetworkType,
    /// Whether the hardware is a software fake (development builds)
    #[serde(default)]
    pub is_hardware_fake: bool,
    /// Backend environment name
    #[serde(default)]
    pub f8e_environment: String,
    /// Test account flag
    #[serde(default)]
    pub is_test_account: bool,
    /// Whether social recovery uses fake collaborators
    #[serde(default)]
    pub is_using_soc_rec_fakes: bool,
}

/// Locally persisted key material references for the active full account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keybox {
    /// Owning account
    pub full_account_id: FullAccountId,
    /// Currently active keyset
    pub active_spending_keyset: SpendingKeyset,
    /// All known keysets, active included
    pub keysets: Vec<SpendingKeyset>,
    /// Whether `keysets` is complete and may be used instead of asking the server
    pub can_use_keyset_list: bool,
    /// Active app keys
    pub active_app_key_bundle: AppKeyBundle,
    /// Active hardware keys
    pub active_hw_key_bundle: HwKeyBundle,
    /// Hardware signature over the app global auth key
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    /// Account configuration
    pub config: FullAccountConfig,
}

/// SSEK-sealed watching descriptor for one keyset, as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorBackup {
    /// Keyset the descriptor belongs to
    pub keyset_id: ServerKeysetId,
    /// Sealed descriptor string
    pub sealed_descriptor: SealedData,
}
