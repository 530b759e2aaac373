//! Deterministic domain fixtures
//!
//! Key strings follow the descriptor-key shape `[fingerprint/path]xpub/*` so
//! they survive a trip through the descriptor grammar. `n` selects a distinct
//! generation of keys.

use custody_core::{
    AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, AppKeyBundle, AppRecoveryAuthPublicKey,
    AppSpendingPublicKey, BitcoinNetworkType, FullAccountConfig, FullAccountId, HwAuthPublicKey,
    HwKeyBundle, HwSpendingPublicKey, Keybox, LocalId, LocalRecovery,
    LocalRecoveryAttemptProgress, PhysicalFactor, ServerKeyset, ServerKeysetId, ServerRecovery,
    ServerSpendingPublicKey, SpendingKeyset,
};

pub const NETWORK: BitcoinNetworkType = BitcoinNetworkType::Signet;

pub fn account_id() -> FullAccountId {
    FullAccountId::new("urn:wallet-account:000000000000000000000001")
}

pub fn app_spending_key(n: u8) -> AppSpendingPublicKey {
    AppSpendingPublicKey::new(format!("[a0a0a0{n:02x}/84'/1'/0']tpubAppSpending{n}/*"))
}

pub fn hw_spending_key(n: u8) -> HwSpendingPublicKey {
    HwSpendingPublicKey::new(format!("[b0b0b0{n:02x}/84'/1'/0']tpubHwSpending{n}/*"))
}

pub fn server_spending_key(n: u8) -> ServerSpendingPublicKey {
    ServerSpendingPublicKey::new(format!("[c0c0c0{n:02x}/84'/1'/0']tpubServerSpending{n}/*"))
}

pub fn keyset_id(n: u8) -> ServerKeysetId {
    ServerKeysetId::new(format!("keyset-{n}"))
}

pub fn spending_keyset(n: u8) -> SpendingKeyset {
    SpendingKeyset {
        local_id: SpendingKeyset::derived_local_id(&keyset_id(n)),
        network_type: NETWORK,
        app_key: app_spending_key(n),
        hardware_key: hw_spending_key(n),
        server_keyset: ServerKeyset {
            keyset_id: keyset_id(n),
            server_public_key: server_spending_key(n),
        },
    }
}

pub fn app_key_bundle(n: u8) -> AppKeyBundle {
    AppKeyBundle {
        local_id: LocalId::derived(&["fixture-app-bundle", &n.to_string()]),
        spending_key: app_spending_key(n),
        auth_key: AppGlobalAuthPublicKey::new(format!("02a1{n:02x}global")),
        network_type: NETWORK,
        recovery_auth_key: AppRecoveryAuthPublicKey::new(format!("02a2{n:02x}recovery")),
    }
}

pub fn hw_key_bundle(n: u8) -> HwKeyBundle {
    HwKeyBundle {
        local_id: LocalId::derived(&["fixture-hw-bundle", &n.to_string()]),
        spending_key: hw_spending_key(n),
        auth_key: HwAuthPublicKey::new(format!("03b1{n:02x}hardware")),
        network_type: NETWORK,
    }
}

pub fn hw_signature(n: u8) -> AppGlobalAuthKeyHwSignature {
    AppGlobalAuthKeyHwSignature::new(format!("3045{n:02x}"))
}

pub fn account_config() -> FullAccountConfig {
    FullAccountConfig {
        bitcoin_network_type: NETWORK,
        is_hardware_fake: true,
        f8e_environment: "Development".to_string(),
        is_test_account: true,
        is_using_soc_rec_fakes: true,
    }
}

/// Keybox whose active keyset is generation `active`, holding `history` keysets.
pub fn keybox(active: u8, history: &[u8], can_use_keyset_list: bool) -> Keybox {
    Keybox {
        full_account_id: account_id(),
        active_spending_keyset: spending_keyset(active),
        keysets: history.iter().copied().map(spending_keyset).collect(),
        can_use_keyset_list,
        active_app_key_bundle: app_key_bundle(active),
        active_hw_key_bundle: hw_key_bundle(active),
        app_global_auth_key_hw_signature: hw_signature(active),
        config: account_config(),
    }
}

/// Generation used for destination keys in recovery fixtures.
pub const DESTINATION: u8 = 9;

/// Local recovery to the [`DESTINATION`] keys.
pub fn local_recovery(
    lost_factor: PhysicalFactor,
    progress: LocalRecoveryAttemptProgress,
) -> LocalRecovery {
    LocalRecovery {
        full_account_id: account_id(),
        lost_factor,
        app_key_bundle: app_key_bundle(DESTINATION),
        hw_key_bundle: hw_key_bundle(DESTINATION),
        app_global_auth_key_hw_signature: hw_signature(DESTINATION),
        progress,
    }
}

/// Server record matching `local`, with the given delay window.
pub fn server_recovery_for(local: &LocalRecovery, start: u64, end: u64) -> ServerRecovery {
    ServerRecovery {
        full_account_id: local.full_account_id.clone(),
        lost_factor: local.lost_factor,
        delay_start_time: start,
        delay_end_time: end,
        destination_auth_keys: local.destination_auth_keys(),
    }
}

/// Server record for a recovery started by another device.
pub fn foreign_server_recovery(lost_factor: PhysicalFactor) -> ServerRecovery {
    let mut foreign = local_recovery(lost_factor, LocalRecoveryAttemptProgress::Initiated);
    foreign.app_key_bundle = app_key_bundle(42);
    foreign.hw_key_bundle = hw_key_bundle(42);
    server_recovery_for(&foreign, 0, 0)
}
