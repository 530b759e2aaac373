//! Account authentication, token storage and app-key signing

use crate::identifiers::FullAccountId;
use crate::keys::{AuthPublicKey, Signature};
use crate::CustodyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope a token set was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthTokenScope {
    /// Authenticated with the app global auth key.
    Global,
    /// Authenticated with the app recovery auth key.
    Recovery,
}

macro_rules! bearer_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw token.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Raw token. Never log it.
            pub fn raw(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

bearer_token!(
    /// Short-lived bearer token.
    AccessToken
);
bearer_token!(
    /// Long-lived refresh token.
    RefreshToken
);

/// Tokens issued for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAuthTokens {
    /// Access token
    pub access_token: AccessToken,
    /// Refresh token
    pub refresh_token: RefreshToken,
}

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    /// Account the key belongs to
    pub account_id: FullAccountId,
    /// Fresh tokens
    pub tokens: AccountAuthTokens,
}

/// Challenge-response authentication against the backend.
#[async_trait]
pub trait AccountAuthenticator: Send + Sync {
    /// Authenticate with the private half of `auth_key`, looked up by the implementation.
    async fn authenticate(
        &self,
        auth_key: &AuthPublicKey,
        scope: AuthTokenScope,
    ) -> CustodyResult<AuthenticatedAccount>;
}

/// Persistent token storage.
#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    /// Replace the tokens for every listed scope of `account_id` in one write.
    ///
    /// On error none of the listed scopes change.
    async fn set_tokens(
        &self,
        account_id: &FullAccountId,
        tokens: Vec<(AuthTokenScope, AccountAuthTokens)>,
    ) -> CustodyResult<()>;

    /// Tokens for `(account_id, scope)`.
    async fn tokens(
        &self,
        account_id: &FullAccountId,
        scope: AuthTokenScope,
    ) -> CustodyResult<Option<AccountAuthTokens>>;
}

/// Signs with app auth private keys held in the private-key store.
#[async_trait]
pub trait AppAuthKeySigner: Send + Sync {
    /// Sign `message` with the private half of `public_key`.
    async fn sign(&self, public_key: &AuthPublicKey, message: &[u8]) -> CustodyResult<Signature>;
}
