//! Private key stores
//!
//! Keypairs are stored under their public half. Writing an existing public key
//! overwrites; lookups return `None` rather than failing when a key is absent.

use crate::keys::{
    AppAuthKeypair, AppSpendingKeypair, AppSpendingPublicKey, AuthPublicKey,
    DelegatedDecryptionKeypair, DelegatedDecryptionPublicKey, PrivateKey,
};
use crate::CustodyResult;
use async_trait::async_trait;

/// Secure storage for app spending and auth private keys.
#[async_trait]
pub trait AppPrivateKeyStore: Send + Sync {
    /// Store a spending keypair, replacing any entry for the same public key.
    async fn store_spending_keypair(&self, keypair: &AppSpendingKeypair) -> CustodyResult<()>;

    /// Store an auth keypair, replacing any entry for the same public key.
    async fn store_auth_keypair(&self, keypair: &AppAuthKeypair) -> CustodyResult<()>;

    /// Private half of a spending key.
    async fn spending_private_key(
        &self,
        public_key: &AppSpendingPublicKey,
    ) -> CustodyResult<Option<PrivateKey>>;

    /// Private half of an auth key.
    async fn auth_private_key(&self, public_key: &AuthPublicKey)
        -> CustodyResult<Option<PrivateKey>>;
}

/// Storage for social-recovery key material.
#[async_trait]
pub trait RelationshipsKeyStore: Send + Sync {
    /// Store the delegated-decryption keypair, replacing any entry for the same public key.
    async fn store_delegated_decryption_keypair(
        &self,
        keypair: &DelegatedDecryptionKeypair,
    ) -> CustodyResult<()>;

    /// Look up a delegated-decryption keypair by public key.
    async fn delegated_decryption_keypair(
        &self,
        public_key: &DelegatedDecryptionPublicKey,
    ) -> CustodyResult<Option<DelegatedDecryptionKeypair>>;
}
