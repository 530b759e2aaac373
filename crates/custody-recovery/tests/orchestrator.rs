//! Delay-and-notify orchestration against in-memory collaborators

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use assert_matches::assert_matches;
use common::{attempting_completion, sealed_csek, sealed_ssek, Harness, Setup, ROTATION_FLOOR};
use custody_backup::DescriptorBackupPreparedData;
use custody_core::effects::{AuthTokenScope, RecoveryDao, StaticFeatureFlags};
use custody_core::{
    CancellationToken, CompleteDelayNotifyChallenge, CustodyError, ErrorClass,
    LocalRecoveryAttemptProgress, PhysicalFactor, ProgressStep, Recovery, Signature,
    SignedChallenge, WalletKind,
};
use custody_recovery::{RecoveryError, RecoveryStep};
use custody_testkit::{fixtures, FakeAppAuthKeySigner, FakeHardware};
use std::time::Duration;

fn created(n: u8) -> LocalRecoveryAttemptProgress {
    LocalRecoveryAttemptProgress::CreatedSpendingKeys {
        keyset: fixtures::spending_keyset(n),
    }
}

#[tokio::test]
async fn app_signed_challenge_is_rejected_before_any_backend_call() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let app_signed = SignedChallenge::AppSigned {
        challenge: h.challenge(),
        signature: Signature::new("app-signature"),
    };

    let err = h
        .orchestrator
        .rotate_auth_keys(&app_signed, sealed_csek("a"), sealed_ssek("a"))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        RecoveryError::WrongSigner {
            expected: PhysicalFactor::Hardware,
            signer: PhysicalFactor::App,
        }
    );
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert_eq!(h.backend.faults.calls("complete_recovery"), 0);
    assert_eq!(h.signer.faults.calls("sign"), 0);
    assert_eq!(h.dao.faults.calls("set_local_recovery_progress"), 0);
    assert_eq!(h.dao.stored_progress(), Some(LocalRecoveryAttemptProgress::Initiated));
}

#[tokio::test]
async fn challenge_for_other_keys_is_rejected() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let local = h.local();
    let wrong = CompleteDelayNotifyChallenge::new(
        PhysicalFactor::Hardware,
        &local.destination_auth_keys(),
    );
    let signed = SignedChallenge::HardwareSigned {
        signature: FakeHardware::expected_signature(wrong.as_bytes()),
        challenge: wrong,
    };

    assert_matches!(
        h.orchestrator
            .rotate_auth_keys(&signed, sealed_csek("a"), sealed_ssek("a"))
            .await,
        Err(RecoveryError::ChallengeMismatch)
    );
    assert_eq!(h.backend.faults.calls("complete_recovery"), 0);
}

#[tokio::test(start_paused = true)]
async fn rotation_takes_at_least_the_configured_floor() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let signed = h.hw_signed().await;

    let started = tokio::time::Instant::now();
    h.orchestrator
        .rotate_auth_keys(&signed, sealed_csek("a"), sealed_ssek("a"))
        .await
        .unwrap();
    assert!(started.elapsed() >= ROTATION_FLOOR);

    let completions = h.backend.completions();
    assert_eq!(completions.len(), 1);
    let challenge = h.challenge();
    assert_eq!(completions[0].challenge, challenge.as_bytes());
    assert_eq!(
        completions[0].app_signature,
        FakeAppAuthKeySigner::expected_signature(
            h.local().app_key_bundle.auth_key.as_auth_key(),
            challenge.as_bytes()
        )
    );
    assert_eq!(
        completions[0].hardware_signature,
        FakeHardware::expected_signature(challenge.as_bytes())
    );

    assert_eq!(h.dao.stored_server(), None);
    assert_eq!(h.status.current().name(), "still_recovering");
    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::RotateAuthTokens
    );
}

#[tokio::test(start_paused = true)]
async fn failed_completion_keeps_attempting_completion_and_can_be_retried() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::Hardware,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let signed = h.hw_signed().await;
    h.backend
        .faults
        .fail_next("complete_recovery", CustodyError::network("502"));

    let err = h
        .orchestrator
        .rotate_auth_keys(&signed, sealed_csek("a"), sealed_ssek("a"))
        .await
        .unwrap_err();
    assert_matches!(err, RecoveryError::Collaborator { step: "complete_recovery", .. });
    assert!(err.is_retryable());
    assert_eq!(h.dao.stored_progress(), Some(attempting_completion("a")));
    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::RotateAuthKeys
    );

    h.orchestrator
        .rotate_auth_keys(&signed, sealed_csek("b"), sealed_ssek("b"))
        .await
        .unwrap();
    assert_eq!(h.backend.completions().len(), 1);
    let progress = h.dao.stored_progress().unwrap();
    assert_eq!(
        progress.sealed_keys(),
        Some((&sealed_csek("a"), &sealed_ssek("a")))
    );
}

#[tokio::test(start_paused = true)]
async fn retry_after_server_already_completed_is_success() {
    let h = Harness::build(Setup::completed(
        PhysicalFactor::App,
        attempting_completion("a"),
    ));
    // The process died after the server completed but before the record was dropped.
    let local = h.local();
    h.dao
        .set_active_server_recovery(Some(&fixtures::server_recovery_for(
            &local,
            common::DELAY_START,
            common::DELAY_END,
        )))
        .await
        .unwrap();
    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::RotateAuthKeys
    );

    let signed = h.hw_signed().await;
    h.orchestrator
        .rotate_auth_keys(&signed, sealed_csek("b"), sealed_ssek("b"))
        .await
        .unwrap();

    assert!(h.backend.completions().is_empty());
    assert_eq!(h.dao.stored_server(), None);
    assert_eq!(h.dao.stored_progress(), Some(attempting_completion("a")));
    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::RotateAuthTokens
    );
}

#[tokio::test]
async fn pending_step_waits_for_the_delay() {
    let mut setup = Setup::lost(PhysicalFactor::App, LocalRecoveryAttemptProgress::Initiated);
    setup.now_secs = common::DELAY_END - 30;
    let h = Harness::started(setup).await;

    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::WaitForDelay { remaining_secs: 30 }
    );
    h.clock.advance(30);
    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::RotateAuthKeys
    );
}

#[tokio::test(start_paused = true)]
async fn rotation_before_the_delay_ends_changes_nothing() {
    let mut setup = Setup::lost(PhysicalFactor::App, LocalRecoveryAttemptProgress::Initiated);
    setup.now_secs = common::DELAY_END - 30;
    let h = Harness::started(setup).await;
    let signed = h.hw_signed().await;

    let err = h
        .orchestrator
        .rotate_auth_keys(&signed, sealed_csek("a"), sealed_ssek("a"))
        .await
        .unwrap_err();

    assert_eq!(err, RecoveryError::DelayPending { remaining_secs: 30 });
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert_eq!(
        h.dao.stored_progress(),
        Some(LocalRecoveryAttemptProgress::Initiated)
    );
    assert_eq!(h.signer.faults.calls("sign"), 0);
    assert!(h.backend.completions().is_empty());

    h.clock.advance(30);
    h.orchestrator
        .rotate_auth_keys(&signed, sealed_csek("a"), sealed_ssek("a"))
        .await
        .unwrap();
    assert_eq!(h.backend.completions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_app_recovery_runs_to_completion() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let orchestrator = &h.orchestrator;
    let token = CancellationToken::new();

    assert_eq!(orchestrator.pending_step().await.unwrap(), RecoveryStep::RotateAuthKeys);
    let new_ssek = h.new_sealed_ssek().await;
    let signed = h.hw_signed().await;
    orchestrator
        .rotate_auth_keys(&signed, sealed_csek("new"), new_ssek.clone())
        .await
        .unwrap();

    assert_eq!(orchestrator.pending_step().await.unwrap(), RecoveryStep::RotateAuthTokens);
    orchestrator.rotate_auth_tokens().await.unwrap();
    assert_eq!(h.tokens.len(), 2);
    orchestrator.verify_auth_keys_after_rotation().await.unwrap();

    assert_eq!(
        orchestrator.pending_step().await.unwrap(),
        RecoveryStep::CreateSpendingKeyset
    );
    let keyset = orchestrator.create_spending_keyset().await.unwrap();
    assert_eq!(keyset.app_key, fixtures::app_spending_key(fixtures::DESTINATION));
    assert_eq!(keyset.hardware_key, fixtures::hw_spending_key(fixtures::DESTINATION));
    assert_eq!(keyset.network_type, fixtures::NETWORK);
    assert_eq!(h.backend.created_kinds(), vec![WalletKind::Legacy]);

    assert_eq!(
        orchestrator.pending_step().await.unwrap(),
        RecoveryStep::UploadDescriptorBackups
    );
    let prepared = orchestrator.prepare_descriptor_backups().await.unwrap();
    assert_matches!(&prepared, DescriptorBackupPreparedData::EncryptOnly { keysets_to_encrypt } => {
        assert_eq!(keysets_to_encrypt, &vec![keyset.clone()]);
    });
    let proof = orchestrator
        .hardware_proof_of_possession(&h.hardware, &token)
        .await
        .unwrap();
    let covered = orchestrator
        .upload_descriptor_backups(&prepared, &new_ssek, Some(&proof))
        .await
        .unwrap();
    assert_eq!(covered, vec![keyset.clone()]);
    let uploads = h.backend.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].sealed_ssek, new_ssek);
    assert_eq!(uploads[0].app_auth_key, h.local().app_key_bundle.auth_key);
    assert!(uploads[0].had_proof_of_possession);

    assert_eq!(
        orchestrator.pending_step().await.unwrap(),
        RecoveryStep::ActivateSpendingKeyset
    );
    assert_eq!(orchestrator.activate_spending_keyset().await.unwrap(), keyset);
    assert_eq!(h.backend.active_keyset_id().as_ref(), Some(keyset.keyset_id()));

    assert_eq!(orchestrator.pending_step().await.unwrap(), RecoveryStep::BackUpToCloud);
    orchestrator.mark_backed_up_to_cloud().await.unwrap();
    assert_eq!(orchestrator.pending_step().await.unwrap(), RecoveryStep::SweepFunds);
    orchestrator.mark_funds_swept(&keyset).await.unwrap();
    assert_eq!(orchestrator.pending_step().await.unwrap(), RecoveryStep::Complete);
    orchestrator.complete_recovery().await.unwrap();

    assert_eq!(h.status.current(), Recovery::NoActiveRecovery);
    assert_eq!(h.dao.stored_local(), None);
    let history: Vec<_> = h.dao.progress_history().iter().map(|p| p.name()).collect();
    assert_eq!(
        history,
        vec![
            "attempting_completion",
            "rotated_auth_keys",
            "created_spending_keys",
            "uploaded_descriptor_backups",
            "activated_spending_keys",
            "backed_up_to_cloud",
            "swept_funds",
        ]
    );
}

#[tokio::test]
async fn resume_after_keyset_creation_does_not_create_again() {
    let h = Harness::started(Setup::completed(PhysicalFactor::App, created(fixtures::DESTINATION)))
        .await;

    assert_eq!(
        h.orchestrator.pending_step().await.unwrap(),
        RecoveryStep::UploadDescriptorBackups
    );
    let keyset = h.orchestrator.create_spending_keyset().await.unwrap();

    assert_eq!(keyset, fixtures::spending_keyset(fixtures::DESTINATION));
    assert!(h.backend.created_kinds().is_empty());
    assert_eq!(h.backend.faults.calls("list_keysets"), 0);
    assert_eq!(h.dao.faults.calls("set_local_recovery_progress"), 0);
}

#[tokio::test]
async fn keyset_kind_follows_wallet_and_flags() {
    let cases = [
        (WalletKind::Private, false, false, WalletKind::Private),
        (WalletKind::Legacy, true, true, WalletKind::Private),
        (WalletKind::Legacy, true, false, WalletKind::Legacy),
        (WalletKind::Legacy, false, true, WalletKind::Legacy),
    ];
    for (wallet_kind, delegation, auto_migrate, expected) in cases {
        let mut setup = Setup::completed(
            PhysicalFactor::Hardware,
            LocalRecoveryAttemptProgress::RotatedAuthKeys,
        );
        setup.flags = StaticFeatureFlags {
            private_wallet_delegation: delegation,
            auto_migrate_on_recovery: auto_migrate,
        };
        let h = Harness::build(setup);
        h.backend.set_wallet_kind(wallet_kind);

        let keyset = h.orchestrator.create_spending_keyset().await.unwrap();

        assert_eq!(
            h.backend.created_kinds(),
            vec![expected],
            "wallet {wallet_kind:?}, delegation {delegation}, auto-migrate {auto_migrate}"
        );
        assert_eq!(
            keyset.local_id,
            custody_core::SpendingKeyset::derived_local_id(keyset.keyset_id())
        );
    }
}

#[tokio::test]
async fn token_rotation_is_all_or_nothing() {
    let mut setup = Setup::completed(PhysicalFactor::App, attempting_completion("a"));
    setup.keybox = Some(fixtures::keybox(1, &[1], true));
    let h = Harness::build(setup);
    let keys = h.local().destination_auth_keys();
    h.authenticator.reject(keys.app_recovery_auth_key.as_auth_key());

    assert_matches!(
        h.orchestrator.rotate_auth_tokens().await,
        Err(RecoveryError::Collaborator { step: "authenticate_recovery", .. })
    );
    assert!(h.tokens.is_empty());
    assert_eq!(h.keybox_store.keybox(), Some(fixtures::keybox(1, &[1], true)));
    assert_eq!(h.dao.stored_progress(), Some(attempting_completion("a")));

    h.authenticator
        .register(keys.app_recovery_auth_key.as_auth_key(), &fixtures::account_id());
    h.orchestrator.rotate_auth_tokens().await.unwrap();

    assert_eq!(h.tokens.len(), 2);
    let keybox = h.keybox_store.keybox().unwrap();
    assert_eq!(keybox.active_app_key_bundle.auth_key, keys.app_global_auth_key);
    assert_eq!(keybox.active_hw_key_bundle.auth_key, keys.hardware_auth_key);
    assert_eq!(
        h.dao.stored_progress(),
        Some(LocalRecoveryAttemptProgress::RotatedAuthKeys)
    );
}

#[tokio::test]
async fn failed_token_write_stores_nothing_and_restores_the_keybox() {
    let mut setup = Setup::completed(PhysicalFactor::App, attempting_completion("a"));
    setup.keybox = Some(fixtures::keybox(1, &[1], true));
    let h = Harness::build(setup);
    h.tokens.fail_scope(AuthTokenScope::Recovery);

    assert_matches!(
        h.orchestrator.rotate_auth_tokens().await,
        Err(RecoveryError::Collaborator { step: "token_store.set_tokens", .. })
    );
    assert!(h.tokens.is_empty());
    assert_eq!(h.keybox_store.keybox(), Some(fixtures::keybox(1, &[1], true)));
    assert_eq!(h.dao.stored_progress(), Some(attempting_completion("a")));

    h.tokens.heal_scope(AuthTokenScope::Recovery);
    h.orchestrator.rotate_auth_tokens().await.unwrap();

    assert_eq!(h.tokens.len(), 2);
    assert_eq!(
        h.keybox_store.keybox().unwrap().active_app_key_bundle.auth_key,
        h.local().destination_auth_keys().app_global_auth_key
    );
}

#[tokio::test]
async fn token_rotation_needs_completion_first() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    assert_matches!(
        h.orchestrator.rotate_auth_tokens().await,
        Err(RecoveryError::MissingPrerequisite {
            step: "rotate_auth_tokens",
            required: "attempting_completion",
        })
    );
    assert_eq!(h.authenticator.faults.calls("authenticate"), 0);
}

#[tokio::test]
async fn verification_failure_is_reported_as_post_rotation() {
    let h = Harness::build(Setup::completed(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::RotatedAuthKeys,
    ));
    let keys = h.local().destination_auth_keys();
    h.authenticator.reject(keys.app_global_auth_key.as_auth_key());

    let err = h
        .orchestrator
        .verify_auth_keys_after_rotation()
        .await
        .unwrap_err();

    assert_matches!(
        err,
        RecoveryError::VerificationFailed {
            scope: AuthTokenScope::Global,
            ..
        }
    );
    assert!(err.is_post_rotation());
}

#[tokio::test]
async fn proof_of_possession_needs_stored_tokens() {
    let h = Harness::build(Setup::completed(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::RotatedAuthKeys,
    ));
    assert_matches!(
        h.orchestrator
            .hardware_proof_of_possession(&h.hardware, &CancellationToken::new())
            .await,
        Err(RecoveryError::MissingPrerequisite { .. })
    );
    assert_eq!(h.hardware.faults.calls("sign_access_token"), 0);
}

#[tokio::test]
async fn activation_needs_uploaded_descriptors() {
    let h = Harness::build(Setup::completed(PhysicalFactor::App, created(fixtures::DESTINATION)));
    assert_matches!(
        h.orchestrator.activate_spending_keyset().await,
        Err(RecoveryError::MissingPrerequisite {
            step: "activate_spending_keyset",
            required: "uploaded_descriptor_backups",
        })
    );
    assert_eq!(h.backend.faults.calls("activate_keyset"), 0);
}

#[tokio::test]
async fn replayed_upload_and_activation_are_no_ops() {
    let keyset = fixtures::spending_keyset(fixtures::DESTINATION);
    let h = Harness::build(Setup::completed(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::ActivatedSpendingKeys {
            keyset: keyset.clone(),
        },
    ));
    let prepared = DescriptorBackupPreparedData::EncryptOnly {
        keysets_to_encrypt: vec![keyset.clone()],
    };

    let covered = h
        .orchestrator
        .upload_descriptor_backups(&prepared, &sealed_ssek("a"), None)
        .await
        .unwrap();
    assert!(covered.is_empty());
    assert_eq!(h.orchestrator.activate_spending_keyset().await.unwrap(), keyset);

    assert_eq!(h.backend.faults.calls("update_descriptor_backups"), 0);
    assert_eq!(h.backend.faults.calls("activate_keyset"), 0);
}

#[tokio::test]
async fn funds_cannot_be_marked_swept_before_cloud_backup() {
    let h = Harness::build(Setup::completed(
        PhysicalFactor::Hardware,
        LocalRecoveryAttemptProgress::ActivatedSpendingKeys {
            keyset: fixtures::spending_keyset(fixtures::DESTINATION),
        },
    ));
    assert_matches!(
        h.orchestrator
            .mark_funds_swept(&fixtures::spending_keyset(fixtures::DESTINATION))
            .await,
        Err(RecoveryError::MissingPrerequisite {
            required: "backed_up_to_cloud",
            ..
        })
    );
    assert_matches!(
        h.orchestrator.complete_recovery().await,
        Err(RecoveryError::MissingPrerequisite { required: "swept_funds", .. })
    );
}

#[tokio::test]
async fn cancel_clears_local_and_server_recovery() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;

    h.orchestrator.cancel_delay_notify().await.unwrap();

    assert_eq!(h.backend.recovery(), None);
    assert_eq!(h.dao.stored_local(), None);
    assert_eq!(h.status.current(), Recovery::NoActiveRecovery);
}

#[tokio::test]
async fn cancel_treats_missing_server_recovery_as_cancelled() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::Hardware,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    h.backend.set_recovery(None);

    h.orchestrator.cancel_delay_notify().await.unwrap();

    assert_eq!(h.backend.faults.calls("cancel_recovery"), 1);
    assert_eq!(h.status.current(), Recovery::NoActiveRecovery);
}

#[tokio::test]
async fn cancel_failure_keeps_local_recovery() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    h.backend
        .faults
        .fail_next("cancel_recovery", CustodyError::network("offline"));

    let err = h.orchestrator.cancel_delay_notify().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(h.dao.stored_local().is_some());
    assert_eq!(h.status.current().name(), "still_recovering");
}

#[tokio::test]
async fn stale_operations_fail_fast_after_cancel() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    h.orchestrator.cancel_delay_notify().await.unwrap();
    let calls_before = h.backend.faults.total_calls();

    assert_matches!(
        h.orchestrator.cancel_delay_notify().await,
        Err(RecoveryError::NotInProgress { state: "no_active_recovery" })
    );
    assert_matches!(
        h.orchestrator.create_spending_keyset().await,
        Err(RecoveryError::NotInProgress { .. })
    );
    assert_eq!(h.backend.faults.total_calls(), calls_before);
}

#[tokio::test]
async fn recovery_started_elsewhere_is_not_driven_here() {
    let h = Harness::build(Setup::none());
    h.backend
        .set_recovery(Some(fixtures::foreign_server_recovery(PhysicalFactor::App)));
    h.dao
        .set_active_server_recovery(h.backend.recovery().as_ref())
        .await
        .unwrap();

    assert_matches!(
        h.orchestrator.pending_step().await,
        Err(RecoveryError::NotInProgress { state: "someone_else_is_recovering" })
    );
}

#[tokio::test(start_paused = true)]
async fn user_exit_during_hardware_tap_leaves_progress_untouched() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    h.hardware.set_tap_delay(Duration::from_secs(60));
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(
        h.orchestrator.run_cancellable(
            &token,
            h.orchestrator.sign_completion_challenge(&h.hardware, &token)
        ),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        }
    );

    let err = result.unwrap_err();
    assert_eq!(err, RecoveryError::Cancelled);
    assert_eq!(err.class(), ErrorClass::Cancelled);
    assert_eq!(h.dao.stored_progress(), Some(LocalRecoveryAttemptProgress::Initiated));
    assert_eq!(h.status.current().name(), "still_recovering");
    assert_eq!(h.hardware.faults.calls("sign_challenge"), 0);
}

#[tokio::test]
async fn already_cancelled_token_skips_the_operation() {
    let h = Harness::started(Setup::lost(
        PhysicalFactor::App,
        LocalRecoveryAttemptProgress::Initiated,
    ))
    .await;
    let token = CancellationToken::new();
    token.cancel();

    assert_matches!(
        h.orchestrator
            .run_cancellable(&token, h.orchestrator.cancel_delay_notify())
            .await,
        Err(RecoveryError::Cancelled)
    );
    assert_eq!(h.backend.faults.calls("cancel_recovery"), 0);
    assert!(h.dao.stored_local().is_some());
}

#[tokio::test]
async fn progress_step_ordering_matches_commit_order() {
    let h = Harness::build(Setup::completed(PhysicalFactor::App, created(fixtures::DESTINATION)));
    let current = h.orchestrator.current_recovery().await.unwrap();
    let progress = current.still_recovering().unwrap().progress();

    assert!(progress.has_reached(ProgressStep::RotatedAuthKeys));
    assert!(!progress.has_reached(ProgressStep::UploadedDescriptorBackups));
}
