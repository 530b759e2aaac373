//! Shared harness wiring every collaborator to its in-memory fake

#![allow(dead_code)]

use custody_backup::DescriptorBackupService;
use custody_core::effects::{Relationships, StaticFeatureFlags};
use custody_core::{
    CancellationToken, CompleteDelayNotifyChallenge, Keybox, LocalRecovery,
    LocalRecoveryAttemptProgress, PhysicalFactor, RecoveryConfig, SealedCsek, SealedSsek,
    SignedChallenge,
};
use custody_crypto::XChaChaEncryptor;
use custody_recovery::{
    DelayNotifyOrchestrator, RecoveryCollaborators, RecoveryLock, RecoveryStatusCell,
    RecoveryStatusSynchronizer,
};
use custody_testkit::{
    fixtures, init_test_tracing, FakeAccountAuthenticator, FakeAppAuthKeySigner, FakeBackend,
    FakeHardware, FakeRelationshipsService, ManualClock, MemoryAuthTokenStore, MemoryKeyboxStore,
    MemoryRecoveryDao, MemorySsekStore,
};
use std::sync::Arc;
use std::time::Duration;

pub const DELAY_START: u64 = 1_000;
pub const DELAY_END: u64 = 2_000;
pub const ROTATION_FLOOR: Duration = Duration::from_secs(2);
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct Setup {
    pub local: Option<LocalRecovery>,
    /// Whether the backend reports the matching recovery
    pub server_active: bool,
    pub keybox: Option<Keybox>,
    pub relationships: Relationships,
    pub flags: StaticFeatureFlags,
    pub now_secs: u64,
}

impl Setup {
    pub fn lost(factor: PhysicalFactor, progress: LocalRecoveryAttemptProgress) -> Self {
        Self {
            local: Some(fixtures::local_recovery(factor, progress)),
            server_active: true,
            keybox: None,
            relationships: Relationships::default(),
            flags: StaticFeatureFlags::default(),
            now_secs: DELAY_END + 1,
        }
    }

    /// A recovery whose completion already went through on the server.
    pub fn completed(factor: PhysicalFactor, progress: LocalRecoveryAttemptProgress) -> Self {
        Self {
            server_active: false,
            ..Self::lost(factor, progress)
        }
    }

    pub fn none() -> Self {
        Self {
            local: None,
            server_active: false,
            ..Self::lost(PhysicalFactor::App, LocalRecoveryAttemptProgress::Initiated)
        }
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub dao: Arc<MemoryRecoveryDao>,
    pub keybox_store: Arc<MemoryKeyboxStore>,
    pub authenticator: Arc<FakeAccountAuthenticator>,
    pub tokens: Arc<MemoryAuthTokenStore>,
    pub signer: Arc<FakeAppAuthKeySigner>,
    pub relationships: Arc<FakeRelationshipsService>,
    pub ssek_store: Arc<MemorySsekStore>,
    pub clock: Arc<ManualClock>,
    pub hardware: FakeHardware,
    pub descriptors: DescriptorBackupService,
    pub lock: RecoveryLock,
    pub status: RecoveryStatusCell,
    pub orchestrator: DelayNotifyOrchestrator,
    pub synchronizer: Arc<RecoveryStatusSynchronizer>,
}

impl Harness {
    pub fn build(setup: Setup) -> Self {
        init_test_tracing();
        let backend = Arc::new(FakeBackend::new());
        let dao = Arc::new(match &setup.local {
            Some(local) => MemoryRecoveryDao::with_local_recovery(local.clone()),
            None => MemoryRecoveryDao::new(),
        });
        if let (Some(local), true) = (&setup.local, setup.server_active) {
            backend.set_recovery(Some(fixtures::server_recovery_for(
                local,
                DELAY_START,
                DELAY_END,
            )));
        }
        let keybox_store = Arc::new(match setup.keybox {
            Some(keybox) => MemoryKeyboxStore::with_keybox(keybox),
            None => MemoryKeyboxStore::new(),
        });

        let authenticator = Arc::new(FakeAccountAuthenticator::new());
        if let Some(local) = &setup.local {
            let keys = local.destination_auth_keys();
            authenticator.register(keys.app_global_auth_key.as_auth_key(), &local.full_account_id);
            authenticator.register(keys.app_recovery_auth_key.as_auth_key(), &local.full_account_id);
        }

        let tokens = Arc::new(MemoryAuthTokenStore::new());
        let signer = Arc::new(FakeAppAuthKeySigner::new());
        let relationships = Arc::new(FakeRelationshipsService::with_relationships(
            setup.relationships,
        ));
        let ssek_store = Arc::new(MemorySsekStore::new());
        let clock = Arc::new(ManualClock::new(setup.now_secs));
        let descriptors = DescriptorBackupService::new(
            backend.clone(),
            keybox_store.clone(),
            ssek_store.clone(),
            Arc::new(XChaChaEncryptor::new()),
            fixtures::NETWORK,
        );

        let config = RecoveryConfig::new()
            .with_network(fixtures::NETWORK)
            .with_minimum_rotation_duration(ROTATION_FLOOR)
            .with_status_poll_interval(POLL_INTERVAL);
        let lock = RecoveryLock::new();
        let status = RecoveryStatusCell::new();

        let orchestrator = DelayNotifyOrchestrator::new(
            RecoveryCollaborators {
                recovery_server: backend.clone(),
                keyset_server: backend.clone(),
                dao: dao.clone(),
                keybox_store: keybox_store.clone(),
                authenticator: authenticator.clone(),
                token_store: tokens.clone(),
                app_signer: signer.clone(),
                relationships: relationships.clone(),
                flags: Arc::new(setup.flags),
                time: clock.clone(),
                descriptor_backups: descriptors.clone(),
            },
            lock.clone(),
            status.clone(),
            config.clone(),
        );
        let synchronizer = Arc::new(RecoveryStatusSynchronizer::new(
            backend.clone(),
            dao.clone(),
            keybox_store.clone(),
            clock.clone(),
            lock.clone(),
            status.clone(),
            config,
        ));

        Self {
            backend,
            dao,
            keybox_store,
            authenticator,
            tokens,
            signer,
            relationships,
            ssek_store,
            clock,
            hardware: FakeHardware::new(),
            descriptors,
            lock,
            status,
            orchestrator,
            synchronizer,
        }
    }

    /// Build and run one sync so the server record is persisted.
    pub async fn started(setup: Setup) -> Self {
        let h = Self::build(setup);
        h.synchronizer.sync_once().await.unwrap();
        h
    }

    pub fn local(&self) -> LocalRecovery {
        self.dao.stored_local().unwrap()
    }

    pub fn challenge(&self) -> CompleteDelayNotifyChallenge {
        let local = self.local();
        CompleteDelayNotifyChallenge::new(local.lost_factor, &local.destination_auth_keys())
    }

    pub async fn hw_signed(&self) -> SignedChallenge {
        self.orchestrator
            .sign_completion_challenge(&self.hardware, &CancellationToken::new())
            .await
            .unwrap()
    }

    pub async fn new_sealed_ssek(&self) -> SealedSsek {
        self.descriptors
            .generate_ssek(&self.hardware, &CancellationToken::new())
            .await
            .unwrap()
    }
}

pub fn sealed_csek(tag: &str) -> SealedCsek {
    SealedCsek::new(format!("sealed-csek-{tag}").into_bytes())
}

pub fn sealed_ssek(tag: &str) -> SealedSsek {
    SealedSsek::new(format!("sealed-ssek-{tag}").into_bytes())
}

pub fn attempting_completion(tag: &str) -> LocalRecoveryAttemptProgress {
    LocalRecoveryAttemptProgress::AttemptingCompletion {
        sealed_csek: sealed_csek(tag),
        sealed_ssek: sealed_ssek(tag),
    }
}
