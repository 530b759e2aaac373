//! In-memory backend implementing the recovery and keyset endpoints

use async_trait::async_trait;
use custody_core::effects::{CreateKeysetRequest, KeysetServer, ListKeysetsResponse, RecoveryServer};
use custody_core::{
    AppGlobalAuthPublicKey, CompleteDelayNotifyChallenge, CustodyError, CustodyResult,
    DescriptorBackup, FullAccountId, HwFactorProofOfPossession, SealedSsek,
    ServerKeyset, ServerKeysetId, ServerRecovery, ServerSpendingPublicKey, Signature,
    SpendingKeyset, WalletKind,
};
use parking_lot::Mutex;

use crate::fault::Faults;

/// A completion call as the backend received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCall {
    pub challenge: Vec<u8>,
    pub app_signature: Signature,
    pub hardware_signature: Signature,
}

/// A descriptor upload as the backend received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorUpload {
    pub backups: Vec<DescriptorBackup>,
    pub sealed_ssek: SealedSsek,
    pub app_auth_key: AppGlobalAuthPublicKey,
    pub had_proof_of_possession: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    recovery: Option<ServerRecovery>,
    keysets: Vec<SpendingKeyset>,
    wallet_kind: WalletKind,
    descriptor_backups: Vec<DescriptorBackup>,
    wrapped_ssek: Option<SealedSsek>,
    active_keyset_id: Option<ServerKeysetId>,
    created_kinds: Vec<WalletKind>,
    completions: Vec<CompletionCall>,
    uploads: Vec<DescriptorUpload>,
    next_keyset: u32,
}

/// Fake backend. Failures are injected through [`Faults`] keyed by method name.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    pub faults: Faults,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_recovery(&self, recovery: Option<ServerRecovery>) {
        self.state.lock().recovery = recovery;
    }

    pub fn recovery(&self) -> Option<ServerRecovery> {
        self.state.lock().recovery.clone()
    }

    pub fn set_keysets(&self, keysets: Vec<SpendingKeyset>) {
        self.state.lock().keysets = keysets;
    }

    pub fn keysets(&self) -> Vec<SpendingKeyset> {
        self.state.lock().keysets.clone()
    }

    pub fn set_wallet_kind(&self, kind: WalletKind) {
        self.state.lock().wallet_kind = kind;
    }

    pub fn set_descriptor_backups(
        &self,
        backups: Vec<DescriptorBackup>,
        wrapped_ssek: Option<SealedSsek>,
    ) {
        let mut state = self.state.lock();
        state.descriptor_backups = backups;
        state.wrapped_ssek = wrapped_ssek;
    }

    pub fn descriptor_backups(&self) -> Vec<DescriptorBackup> {
        self.state.lock().descriptor_backups.clone()
    }

    pub fn wrapped_ssek(&self) -> Option<SealedSsek> {
        self.state.lock().wrapped_ssek.clone()
    }

    pub fn active_keyset_id(&self) -> Option<ServerKeysetId> {
        self.state.lock().active_keyset_id.clone()
    }

    /// Wallet kinds of every keyset created, in order.
    pub fn created_kinds(&self) -> Vec<WalletKind> {
        self.state.lock().created_kinds.clone()
    }

    pub fn completions(&self) -> Vec<CompletionCall> {
        self.state.lock().completions.clone()
    }

    pub fn uploads(&self) -> Vec<DescriptorUpload> {
        self.state.lock().uploads.clone()
    }

    fn create(&self, request: &CreateKeysetRequest, kind: WalletKind) -> ServerKeyset {
        let mut state = self.state.lock();
        state.next_keyset += 1;
        let n = state.next_keyset;
        let server_keyset = ServerKeyset {
            keyset_id: ServerKeysetId::new(format!("server-keyset-{n}")),
            server_public_key: ServerSpendingPublicKey::new(format!(
                "[5e4e4e{n:02x}/84'/1'/0']tpubServerCreated{n}/*"
            )),
        };
        state.keysets.push(SpendingKeyset {
            local_id: SpendingKeyset::derived_local_id(&server_keyset.keyset_id),
            network_type: request.network,
            app_key: request.app_spending_key.clone(),
            hardware_key: request.hardware_spending_key.clone(),
            server_keyset: server_keyset.clone(),
        });
        state.created_kinds.push(kind);
        if kind == WalletKind::Private {
            state.wallet_kind = WalletKind::Private;
        }
        server_keyset
    }
}

#[async_trait]
impl RecoveryServer for FakeBackend {
    async fn recovery_status(
        &self,
        _account_id: &FullAccountId,
    ) -> CustodyResult<Option<ServerRecovery>> {
        self.faults.check("recovery_status")?;
        Ok(self.state.lock().recovery.clone())
    }

    async fn cancel_recovery(&self, _account_id: &FullAccountId) -> CustodyResult<()> {
        self.faults.check("cancel_recovery")?;
        match self.state.lock().recovery.take() {
            Some(_) => Ok(()),
            None => Err(CustodyError::not_found("no active recovery")),
        }
    }

    async fn complete_recovery(
        &self,
        _account_id: &FullAccountId,
        challenge: &CompleteDelayNotifyChallenge,
        app_signature: &Signature,
        hardware_signature: &Signature,
    ) -> CustodyResult<()> {
        self.faults.check("complete_recovery")?;
        let mut state = self.state.lock();
        if state.recovery.take().is_none() {
            return Err(CustodyError::not_found("no active recovery"));
        }
        state.completions.push(CompletionCall {
            challenge: challenge.as_bytes().to_vec(),
            app_signature: app_signature.clone(),
            hardware_signature: hardware_signature.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl KeysetServer for FakeBackend {
    async fn list_keysets(&self, _account_id: &FullAccountId) -> CustodyResult<ListKeysetsResponse> {
        self.faults.check("list_keysets")?;
        let state = self.state.lock();
        Ok(ListKeysetsResponse {
            keysets: state.keysets.clone(),
            wallet_kind: state.wallet_kind,
            descriptor_backups: state.descriptor_backups.clone(),
            wrapped_ssek: state.wrapped_ssek.clone(),
        })
    }

    async fn create_keyset(&self, request: &CreateKeysetRequest) -> CustodyResult<ServerKeyset> {
        self.faults.check("create_keyset")?;
        Ok(self.create(request, WalletKind::Legacy))
    }

    async fn create_private_keyset(
        &self,
        request: &CreateKeysetRequest,
    ) -> CustodyResult<ServerKeyset> {
        self.faults.check("create_private_keyset")?;
        Ok(self.create(request, WalletKind::Private))
    }

    async fn activate_keyset(
        &self,
        _account_id: &FullAccountId,
        keyset_id: &ServerKeysetId,
    ) -> CustodyResult<()> {
        self.faults.check("activate_keyset")?;
        let mut state = self.state.lock();
        if !state.keysets.iter().any(|k| k.keyset_id() == keyset_id) {
            return Err(CustodyError::not_found(format!("unknown keyset {keyset_id}")));
        }
        state.active_keyset_id = Some(keyset_id.clone());
        Ok(())
    }

    async fn update_descriptor_backups(
        &self,
        _account_id: &FullAccountId,
        backups: &[DescriptorBackup],
        sealed_ssek: &SealedSsek,
        app_auth_key: &AppGlobalAuthPublicKey,
        hw_proof_of_possession: Option<&HwFactorProofOfPossession>,
    ) -> CustodyResult<()> {
        self.faults.check("update_descriptor_backups")?;
        let mut state = self.state.lock();
        state.descriptor_backups = backups.to_vec();
        state.wrapped_ssek = Some(sealed_ssek.clone());
        state.uploads.push(DescriptorUpload {
            backups: backups.to_vec(),
            sealed_ssek: sealed_ssek.clone(),
            app_auth_key: app_auth_key.clone(),
            had_proof_of_possession: hw_proof_of_possession.is_some(),
        });
        Ok(())
    }
}
