//! In-memory storage collaborators

use async_trait::async_trait;
use custody_core::effects::{
    AccountAuthTokens, AppPrivateKeyStore, AuthTokenScope, AuthTokenStore, CsekStore,
    KeyboxStore, RecoveryDao, RelationshipsKeyStore, SsekStore,
};
use custody_core::{
    AppAuthKeypair, AppGlobalAuthKeyHwSignature, AppSpendingKeypair, AppSpendingPublicKey,
    AuthPublicKey, Csek, CustodyError, CustodyResult, DelegatedDecryptionKeypair,
    DelegatedDecryptionPublicKey, DestinationAuthKeys, FullAccountId, Keybox, LocalRecovery,
    LocalRecoveryAttemptProgress, PrivateKey, SealedCsek, SealedSsek, ServerRecovery, Ssek,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::fault::Faults;

macro_rules! memory_secret_store {
    ($(#[$meta:meta])* $name:ident, $trait:ident, $sealed:ty, $key:ty) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            pairs: Mutex<HashMap<$sealed, $key>>,
            pub faults: Faults,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn len(&self) -> usize {
                self.pairs.lock().len()
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Drop one pair, as if the app was reinstalled.
            pub fn forget(&self, sealed: &$sealed) {
                self.pairs.lock().remove(sealed);
            }
        }

        #[async_trait]
        impl $trait for $name {
            async fn get(&self, sealed: &$sealed) -> CustodyResult<Option<$key>> {
                self.faults.check("get")?;
                Ok(self.pairs.lock().get(sealed).cloned())
            }

            async fn set(&self, sealed: &$sealed, key: $key) -> CustodyResult<()> {
                self.faults.check("set")?;
                self.pairs.lock().insert(sealed.clone(), key);
                Ok(())
            }

            async fn clear(&self) -> CustodyResult<()> {
                self.faults.check("clear")?;
                self.pairs.lock().clear();
                Ok(())
            }
        }
    };
}

memory_secret_store!(
    /// In-memory [`CsekStore`].
    MemoryCsekStore,
    CsekStore,
    SealedCsek,
    Csek
);

memory_secret_store!(
    /// In-memory [`SsekStore`].
    MemorySsekStore,
    SsekStore,
    SealedSsek,
    Ssek
);

#[derive(Debug, Default)]
struct PrivateKeys {
    spending: HashMap<AppSpendingPublicKey, PrivateKey>,
    auth: HashMap<AuthPublicKey, PrivateKey>,
    delegated: HashMap<DelegatedDecryptionPublicKey, DelegatedDecryptionKeypair>,
}

/// In-memory private key store, covering both app and relationship keys.
#[derive(Debug, Default)]
pub struct MemoryPrivateKeyStore {
    keys: Mutex<PrivateKeys>,
    pub faults: Faults,
}

impl MemoryPrivateKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spending_key_count(&self) -> usize {
        self.keys.lock().spending.len()
    }

    pub fn auth_key_count(&self) -> usize {
        self.keys.lock().auth.len()
    }

    pub fn delegated_key_count(&self) -> usize {
        self.keys.lock().delegated.len()
    }

    /// Number of successful or failed writes of any kind.
    pub fn write_calls(&self) -> usize {
        self.faults.calls("store_spending_keypair")
            + self.faults.calls("store_auth_keypair")
            + self.faults.calls("store_delegated_decryption_keypair")
    }
}

#[async_trait]
impl AppPrivateKeyStore for MemoryPrivateKeyStore {
    async fn store_spending_keypair(&self, keypair: &AppSpendingKeypair) -> CustodyResult<()> {
        self.faults.check("store_spending_keypair")?;
        self.keys
            .lock()
            .spending
            .insert(keypair.public_key.clone(), keypair.private_key.clone());
        Ok(())
    }

    async fn store_auth_keypair(&self, keypair: &AppAuthKeypair) -> CustodyResult<()> {
        self.faults.check("store_auth_keypair")?;
        self.keys
            .lock()
            .auth
            .insert(keypair.public_key.clone(), keypair.private_key.clone());
        Ok(())
    }

    async fn spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> CustodyResult<Option<PrivateKey>> {
        self.faults.check("spending_private_key")?;
        Ok(self.keys.lock().spending.get(public_key).cloned())
    }

    async fn auth_private_key(
        &self,
        public_key: &AuthPublicKey,
    ) -> CustodyResult<Option<PrivateKey>> {
        self.faults.check("auth_private_key")?;
        Ok(self.keys.lock().auth.get(public_key).cloned())
    }
}

#[async_trait]
impl RelationshipsKeyStore for MemoryPrivateKeyStore {
    async fn store_delegated_decryption_keypair(
        &self,
        keypair: &DelegatedDecryptionKeypair,
    ) -> CustodyResult<()> {
        self.faults.check("store_delegated_decryption_keypair")?;
        self.keys
            .lock()
            .delegated
            .insert(keypair.public_key.clone(), keypair.clone());
        Ok(())
    }

    async fn delegated_decryption_keypair(
        &self,
        public_key: &DelegatedDecryptionPublicKey,
    ) -> CustodyResult<Option<DelegatedDecryptionKeypair>> {
        self.faults.check("delegated_decryption_keypair")?;
        Ok(self.keys.lock().delegated.get(public_key).cloned())
    }
}

#[derive(Debug, Default)]
struct RecoveryRecords {
    local: Option<LocalRecovery>,
    server: Option<ServerRecovery>,
    progress_history: Vec<LocalRecoveryAttemptProgress>,
}

/// In-memory [`RecoveryDao`] recording every committed progress value.
#[derive(Debug, Default)]
pub struct MemoryRecoveryDao {
    records: Mutex<RecoveryRecords>,
    pub faults: Faults,
}

impl MemoryRecoveryDao {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `local` already persisted, as after a process restart.
    pub fn with_local_recovery(local: LocalRecovery) -> Self {
        let dao = Self::default();
        dao.records.lock().local = Some(local);
        dao
    }

    pub fn stored_local(&self) -> Option<LocalRecovery> {
        self.records.lock().local.clone()
    }

    pub fn stored_server(&self) -> Option<ServerRecovery> {
        self.records.lock().server.clone()
    }

    pub fn stored_progress(&self) -> Option<LocalRecoveryAttemptProgress> {
        self.records.lock().local.as_ref().map(|l| l.progress.clone())
    }

    /// Progress values in write order.
    pub fn progress_history(&self) -> Vec<LocalRecoveryAttemptProgress> {
        self.records.lock().progress_history.clone()
    }
}

#[async_trait]
impl RecoveryDao for MemoryRecoveryDao {
    async fn local_recovery(&self) -> CustodyResult<Option<LocalRecovery>> {
        self.faults.check("local_recovery")?;
        Ok(self.records.lock().local.clone())
    }

    async fn set_local_recovery(&self, recovery: &LocalRecovery) -> CustodyResult<()> {
        self.faults.check("set_local_recovery")?;
        let mut records = self.records.lock();
        records.progress_history.push(recovery.progress.clone());
        records.local = Some(recovery.clone());
        Ok(())
    }

    async fn set_local_recovery_progress(
        &self,
        progress: &LocalRecoveryAttemptProgress,
    ) -> CustodyResult<()> {
        self.faults.check("set_local_recovery_progress")?;
        let mut records = self.records.lock();
        let Some(local) = records.local.as_mut() else {
            return Err(CustodyError::not_found("no local recovery"));
        };
        local.progress = progress.clone();
        records.progress_history.push(progress.clone());
        Ok(())
    }

    async fn server_recovery(&self) -> CustodyResult<Option<ServerRecovery>> {
        self.faults.check("server_recovery")?;
        Ok(self.records.lock().server.clone())
    }

    async fn set_active_server_recovery(
        &self,
        recovery: Option<&ServerRecovery>,
    ) -> CustodyResult<()> {
        self.faults.check("set_active_server_recovery")?;
        self.records.lock().server = recovery.cloned();
        Ok(())
    }

    async fn clear(&self) -> CustodyResult<()> {
        self.faults.check("clear")?;
        let mut records = self.records.lock();
        records.local = None;
        records.server = None;
        Ok(())
    }
}

/// In-memory [`KeyboxStore`].
#[derive(Debug, Default)]
pub struct MemoryKeyboxStore {
    keybox: Mutex<Option<Keybox>>,
    pub faults: Faults,
}

impl MemoryKeyboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keybox(keybox: Keybox) -> Self {
        let store = Self::default();
        *store.keybox.lock() = Some(keybox);
        store
    }

    pub fn keybox(&self) -> Option<Keybox> {
        self.keybox.lock().clone()
    }
}

#[async_trait]
impl KeyboxStore for MemoryKeyboxStore {
    async fn active_keybox(&self) -> CustodyResult<Option<Keybox>> {
        self.faults.check("active_keybox")?;
        Ok(self.keybox.lock().clone())
    }

    async fn rotate_keybox_auth_keys(
        &self,
        keys: &DestinationAuthKeys,
        hw_signature: &AppGlobalAuthKeyHwSignature,
    ) -> CustodyResult<Keybox> {
        self.faults.check("rotate_keybox_auth_keys")?;
        let mut guard = self.keybox.lock();
        let keybox = guard
            .as_mut()
            .ok_or_else(|| CustodyError::not_found("no active keybox"))?;
        keybox.active_app_key_bundle.auth_key = keys.app_global_auth_key.clone();
        keybox.active_app_key_bundle.recovery_auth_key = keys.app_recovery_auth_key.clone();
        keybox.active_hw_key_bundle.auth_key = keys.hardware_auth_key.clone();
        keybox.app_global_auth_key_hw_signature = hw_signature.clone();
        Ok(keybox.clone())
    }
}

/// In-memory [`AuthTokenStore`] whose batch writes are all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryAuthTokenStore {
    tokens: Mutex<HashMap<(FullAccountId, AuthTokenScope), AccountAuthTokens>>,
    failing_scopes: Mutex<HashSet<AuthTokenScope>>,
    pub faults: Faults,
}

impl MemoryAuthTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write that includes `scope`.
    pub fn fail_scope(&self, scope: AuthTokenScope) {
        self.failing_scopes.lock().insert(scope);
    }

    pub fn heal_scope(&self, scope: AuthTokenScope) {
        self.failing_scopes.lock().remove(&scope);
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuthTokenStore for MemoryAuthTokenStore {
    async fn set_tokens(
        &self,
        account_id: &FullAccountId,
        tokens: Vec<(AuthTokenScope, AccountAuthTokens)>,
    ) -> CustodyResult<()> {
        self.faults.check("set_tokens")?;
        let failing = self.failing_scopes.lock();
        if let Some((scope, _)) = tokens.iter().find(|(scope, _)| failing.contains(scope)) {
            return Err(CustodyError::storage(format!("{scope:?} token write failed")));
        }
        let mut stored = self.tokens.lock();
        for (scope, scoped) in tokens {
            stored.insert((account_id.clone(), scope), scoped);
        }
        Ok(())
    }

    async fn tokens(
        &self,
        account_id: &FullAccountId,
        scope: AuthTokenScope,
    ) -> CustodyResult<Option<AccountAuthTokens>> {
        self.faults.check("tokens")?;
        Ok(self.tokens.lock().get(&(account_id.clone(), scope)).cloned())
    }
}
