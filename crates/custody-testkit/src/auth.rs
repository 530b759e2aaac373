//! Fake authentication and app-key signing

use async_trait::async_trait;
use custody_core::effects::{
    AccessToken, AccountAuthTokens, AccountAuthenticator, AppAuthKeySigner, AuthTokenScope,
    AuthenticatedAccount, RefreshToken,
};
use custody_core::{AuthPublicKey, CustodyError, CustodyResult, FullAccountId, Signature};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::fault::Faults;

#[derive(Debug, Default)]
struct AuthState {
    accounts: HashMap<AuthPublicKey, FullAccountId>,
    rejected: HashSet<AuthPublicKey>,
    issued: u32,
}

/// Authenticates any registered key; unknown or rejected keys fail.
#[derive(Debug, Default)]
pub struct FakeAccountAuthenticator {
    state: Mutex<AuthState>,
    pub faults: Faults,
}

impl FakeAccountAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `key` as belonging to `account_id`.
    pub fn register(&self, key: &AuthPublicKey, account_id: &FullAccountId) {
        let mut state = self.state.lock();
        state.rejected.remove(key);
        state.accounts.insert(key.clone(), account_id.clone());
    }

    /// Reject `key` from now on.
    pub fn reject(&self, key: &AuthPublicKey) {
        self.state.lock().rejected.insert(key.clone());
    }
}

#[async_trait]
impl AccountAuthenticator for FakeAccountAuthenticator {
    async fn authenticate(
        &self,
        auth_key: &AuthPublicKey,
        scope: AuthTokenScope,
    ) -> CustodyResult<AuthenticatedAccount> {
        self.faults.check("authenticate")?;
        let mut state = self.state.lock();
        if state.rejected.contains(auth_key) {
            return Err(CustodyError::network(format!("auth key {auth_key} rejected")));
        }
        let account_id = state
            .accounts
            .get(auth_key)
            .cloned()
            .ok_or_else(|| CustodyError::not_found(format!("unknown auth key {auth_key}")))?;
        state.issued += 1;
        let n = state.issued;
        Ok(AuthenticatedAccount {
            account_id,
            tokens: AccountAuthTokens {
                access_token: AccessToken::new(format!("access-{scope:?}-{n}")),
                refresh_token: RefreshToken::new(format!("refresh-{scope:?}-{n}")),
            },
        })
    }
}

/// Signs with a deterministic text signature over the key and message.
#[derive(Debug, Default)]
pub struct FakeAppAuthKeySigner {
    pub faults: Faults,
}

impl FakeAppAuthKeySigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature produced for `message` under `public_key`.
    pub fn expected_signature(public_key: &AuthPublicKey, message: &[u8]) -> Signature {
        Signature::new(format!("app:{public_key}:{}", hex::encode(message)))
    }
}

#[async_trait]
impl AppAuthKeySigner for FakeAppAuthKeySigner {
    async fn sign(&self, public_key: &AuthPublicKey, message: &[u8]) -> CustodyResult<Signature> {
        self.faults.check("sign")?;
        Ok(Self::expected_signature(public_key, message))
    }
}
