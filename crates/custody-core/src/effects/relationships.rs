//! Social-recovery relationships
//!
//! Trusted contacts hold an endorsement certificate binding their delegated
//! decryption key to this account's auth keys. Rotating auth keys invalidates
//! every certificate until it is re-endorsed.

use crate::identifiers::{FullAccountId, RelationshipId};
use crate::keys::{
    AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, DelegatedDecryptionPublicKey,
    HwAuthPublicKey, Signature,
};
use crate::CustodyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Endorsement of a trusted contact's key under this account's auth keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedContactKeyCertificate {
    /// Contact's delegated-decryption key
    pub delegated_decryption_key: DelegatedDecryptionPublicKey,
    /// Hardware auth key at endorsement time
    pub hw_auth_public_key: HwAuthPublicKey,
    /// App global auth key at endorsement time
    pub app_global_auth_public_key: AppGlobalAuthPublicKey,
    /// Hardware signature over the app global auth key
    pub app_global_auth_key_hw_signature: AppGlobalAuthKeyHwSignature,
    /// App signature over the contact's delegated-decryption key
    pub trusted_contact_identity_key_app_signature: Signature,
}

/// Someone able to help this account recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedContact {
    /// Relationship id
    pub relationship_id: RelationshipId,
    /// Display alias
    pub alias: String,
    /// Contact's delegated-decryption key
    pub delegated_decryption_key: DelegatedDecryptionPublicKey,
    /// Current endorsement, if any
    pub key_certificate: Option<TrustedContactKeyCertificate>,
}

/// Someone this account helps recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedCustomer {
    /// Relationship id
    pub relationship_id: RelationshipId,
    /// Display alias
    pub alias: String,
}

/// Snapshot of all relationships.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    /// Trusted contacts, endorsed or not
    pub trusted_contacts: Vec<TrustedContact>,
    /// Protected customers
    pub protected_customers: Vec<ProtectedCustomer>,
}

/// Relationship endpoints and local cache.
#[async_trait]
pub trait RelationshipsService: Send + Sync {
    /// Fetch relationships from the server.
    async fn relationships(&self, account_id: &FullAccountId) -> CustodyResult<Relationships>;

    /// Upload a new endorsement for one contact.
    async fn endorse_trusted_contact(
        &self,
        account_id: &FullAccountId,
        relationship_id: &RelationshipId,
        certificate: &TrustedContactKeyCertificate,
    ) -> CustodyResult<()>;

    /// Remove one relationship.
    async fn remove_relationship(
        &self,
        account_id: &FullAccountId,
        relationship_id: &RelationshipId,
    ) -> CustodyResult<()>;

    /// Refresh the local cache from the server.
    async fn sync_relationships(&self, account_id: &FullAccountId) -> CustodyResult<Relationships>;
}
