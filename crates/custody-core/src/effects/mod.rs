//! Collaborator trait definitions
//!
//! The recovery and backup components are parameterized by these traits; they
//! never talk to storage, the backend, or the hardware device directly.
//!
//! # Effect Classification
//!
//! - **Storage**: [`CsekStore`], [`SsekStore`], [`AppPrivateKeyStore`],
//!   [`RelationshipsKeyStore`], [`RecoveryDao`], [`KeyboxStore`], [`AuthTokenStore`]
//! - **Network**: [`RecoveryServer`], [`KeysetServer`], [`AccountAuthenticator`],
//!   [`RelationshipsService`]
//! - **Device**: [`HardwareTransport`], [`AppAuthKeySigner`]
//! - **Crypto**: [`SymmetricKeyEncryptor`]
//! - **Infrastructure**: [`TimeEffects`], [`FeatureFlags`]
//!
//! In-memory implementations live in `custody-testkit`.

pub mod auth;
pub mod encryptor;
pub mod flags;
pub mod hardware;
pub mod keybox;
pub mod keystore;
pub mod recovery_dao;
pub mod relationships;
pub mod secrets;
pub mod server;
pub mod time;

pub use auth::{
    AccessToken, AccountAuthTokens, AccountAuthenticator, AppAuthKeySigner, AuthTokenScope,
    AuthTokenStore, AuthenticatedAccount, RefreshToken,
};
pub use encryptor::SymmetricKeyEncryptor;
pub use flags::{FeatureFlags, StaticFeatureFlags};
pub use hardware::HardwareTransport;
pub use keybox::KeyboxStore;
pub use keystore::{AppPrivateKeyStore, RelationshipsKeyStore};
pub use recovery_dao::RecoveryDao;
pub use relationships::{
    ProtectedCustomer, Relationships, RelationshipsService, TrustedContact,
    TrustedContactKeyCertificate,
};
pub use secrets::{CsekStore, SsekStore};
pub use server::{CreateKeysetRequest, KeysetServer, ListKeysetsResponse, RecoveryServer};
pub use time::{SystemTimeHandler, TimeEffects};
