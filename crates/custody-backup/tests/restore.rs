//! Restoring account keys from a cloud backup

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_matches::assert_matches;
use custody_backup::{BackupCodec, BackupKeyset, FullAccountKeys, KeyBackupRestorer, RestorerError};
use custody_core::effects::{AppPrivateKeyStore, CsekStore, RelationshipsKeyStore};
use custody_core::{
    AppAuthKeypair, AppSpendingKeypair, AuthPublicKey, Csek, CustodyError, DelegatedDecryptionKeypair,
    DelegatedDecryptionPublicKey, ErrorClass, PrivateKey, SealedCsek,
};
use custody_crypto::{generate_symmetric_key, XChaChaEncryptor};
use custody_testkit::{fixtures, init_test_tracing, MemoryCsekStore, MemoryPrivateKeyStore};
use std::sync::Arc;

struct Harness {
    codec: BackupCodec,
    csek_store: Arc<MemoryCsekStore>,
    keys: Arc<MemoryPrivateKeyStore>,
    restorer: KeyBackupRestorer,
}

fn harness() -> Harness {
    init_test_tracing();
    let codec = BackupCodec::new(Arc::new(XChaChaEncryptor::new()));
    let csek_store = Arc::new(MemoryCsekStore::new());
    let keys = Arc::new(MemoryPrivateKeyStore::new());
    let restorer = KeyBackupRestorer::new(
        codec.clone(),
        csek_store.clone(),
        keys.clone(),
        keys.clone(),
    );
    Harness {
        codec,
        csek_store,
        keys,
        restorer,
    }
}

fn account_keys() -> FullAccountKeys {
    let bundle = fixtures::app_key_bundle(1);
    FullAccountKeys {
        active_spending_keyset: BackupKeyset::from_keyset(&fixtures::spending_keyset(2)),
        keysets: vec![
            BackupKeyset::from_keyset(&fixtures::spending_keyset(1)),
            BackupKeyset::from_keyset(&fixtures::spending_keyset(2)),
        ],
        app_spending_keypair: AppSpendingKeypair {
            public_key: fixtures::app_spending_key(2),
            private_key: PrivateKey::new("tprvAppSpending2"),
        },
        app_global_auth_keypair: AppAuthKeypair {
            public_key: bundle.auth_key.as_auth_key().clone(),
            private_key: PrivateKey::new("global-secret"),
        },
        app_recovery_auth_keypair: AppAuthKeypair {
            public_key: bundle.recovery_auth_key.as_auth_key().clone(),
            private_key: PrivateKey::new("recovery-secret"),
        },
        delegated_decryption_keypair: Some(DelegatedDecryptionKeypair {
            public_key: DelegatedDecryptionPublicKey::new("dd-public"),
            private_key: PrivateKey::new("dd-secret"),
        }),
    }
}

async fn sealed_backup(h: &Harness) -> (custody_backup::VersionedBackup, SealedCsek) {
    let csek = Csek(generate_symmetric_key());
    let sealed_csek = SealedCsek::new(b"hw-sealed-csek".to_vec());
    h.csek_store.set(&sealed_csek, csek.clone()).await.unwrap();
    let backup = h
        .codec
        .seal(
            &fixtures::account_id(),
            &account_keys(),
            &csek,
            &sealed_csek,
            &fixtures::hw_key_bundle(2).auth_key,
            &fixtures::hw_signature(2),
            &fixtures::account_config(),
        )
        .unwrap();
    (backup, sealed_csek)
}

#[tokio::test]
async fn restore_writes_every_private_key_and_rebuilds_bundles() {
    let h = harness();
    let (backup, _) = sealed_backup(&h).await;

    let restored = h.restorer.restore(&backup).await.unwrap();

    assert_eq!(restored.active_spending_keyset, fixtures::spending_keyset(2));
    assert_eq!(
        restored.keysets,
        vec![fixtures::spending_keyset(1), fixtures::spending_keyset(2)]
    );
    assert_eq!(restored.active_app_key_bundle.spending_key, fixtures::app_spending_key(2));
    assert_eq!(
        restored.active_app_key_bundle.auth_key,
        fixtures::app_key_bundle(1).auth_key
    );
    assert_eq!(restored.active_hw_key_bundle.auth_key, fixtures::hw_key_bundle(2).auth_key);
    assert_eq!(restored.account_config, fixtures::account_config());
    assert_eq!(restored.app_global_auth_key_hw_signature, fixtures::hw_signature(2));
    assert_eq!(h.codec.decode(restored.raw_backup_for_local_storage.as_bytes()).unwrap(), backup);

    assert_eq!(
        h.keys
            .spending_private_key(&fixtures::app_spending_key(2))
            .await
            .unwrap(),
        Some(PrivateKey::new("tprvAppSpending2"))
    );
    let recovery_key: AuthPublicKey = fixtures::app_key_bundle(1)
        .recovery_auth_key
        .as_auth_key()
        .clone();
    assert_eq!(
        h.keys.auth_private_key(&recovery_key).await.unwrap(),
        Some(PrivateKey::new("recovery-secret"))
    );
    assert!(h
        .keys
        .delegated_decryption_keypair(&DelegatedDecryptionPublicKey::new("dd-public"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn restoring_twice_is_idempotent() {
    let h = harness();
    let (backup, _) = sealed_backup(&h).await;

    let first = h.restorer.restore(&backup).await.unwrap();
    let second = h.restorer.restore(&backup).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.keys.spending_key_count(), 1);
    assert_eq!(h.keys.auth_key_count(), 2);
    assert_eq!(h.keys.delegated_key_count(), 1);
}

#[tokio::test]
async fn missing_csek_fails_before_any_key_is_written() {
    let h = harness();
    let (backup, sealed_csek) = sealed_backup(&h).await;
    h.csek_store.forget(&sealed_csek);

    let err = h.restorer.restore(&backup).await.unwrap_err();

    assert_matches!(err, RestorerError::PkekMissing);
    assert_eq!(err.class(), ErrorClass::MissingSecret);
    assert_eq!(h.keys.write_calls(), 0);
}

#[tokio::test]
async fn storage_failures_name_the_failing_write() {
    let h = harness();
    let (backup, _) = sealed_backup(&h).await;

    h.keys
        .faults
        .fail_next("store_auth_keypair", CustodyError::storage("keychain locked"));
    assert_matches!(
        h.restorer.restore(&backup).await,
        Err(RestorerError::AppAuthKeypairStorage(_))
    );

    h.keys.faults.fail_next(
        "store_delegated_decryption_keypair",
        CustodyError::storage("keychain locked"),
    );
    assert_matches!(
        h.restorer.restore(&backup).await,
        Err(RestorerError::RelationshipsKeyStorage(_))
    );

    h.keys
        .faults
        .fail_next("store_spending_keypair", CustodyError::storage("keychain locked"));
    let err = h.restorer.restore(&backup).await.unwrap_err();
    assert_matches!(err, RestorerError::AppSpendingKeypairStorage(_));
    assert_eq!(err.class(), ErrorClass::Storage);
}

#[tokio::test]
async fn tampered_bundle_is_a_decoding_error() {
    let h = harness();
    let (mut backup, _) = sealed_backup(&h).await;
    backup.sealed_account_keys = h
        .codec
        .seal(
            &fixtures::account_id(),
            &account_keys(),
            &Csek(generate_symmetric_key()),
            &backup.sealed_csek,
            &fixtures::hw_key_bundle(2).auth_key,
            &fixtures::hw_signature(2),
            &fixtures::account_config(),
        )
        .unwrap()
        .sealed_account_keys;

    let err = h.restorer.restore(&backup).await.unwrap_err();
    assert_matches!(err, RestorerError::AccountBackupDecoding(_));
    assert!(!err.is_retryable());
    assert_eq!(h.keys.write_calls(), 0);
}
