//! Custody Core - shared foundation for wallet recovery and key backup
//!
//! Types and collaborator interfaces used by the backup and recovery crates of
//! a 2-of-3 multisig wallet (app key, hardware key, server key).
//!
//! # Architecture Layers
//!
//! ## Domain Types
//! - Identifiers, public keys, zeroizing private keys
//! - Spending keysets, key bundles, the keybox
//! - CSEK/SSEK symmetric keys and their hardware-sealed handles
//! - Recovery records and the merged [`Recovery`] value
//!
//! ## Collaborator Interfaces
//! - [`effects`]: storage, backend, hardware, crypto and time traits. Nothing
//!   in this crate performs I/O itself.
//!
//! ## Ambient
//! - [`CustodyError`] with the [`ErrorClass`] taxonomy
//! - [`RecoveryConfig`]
//! - [`CancellationToken`] for user-exit signals

#![forbid(unsafe_code)]

/// Recovery configuration
pub mod config;

/// Symmetric keys and sealed handles
pub mod crypto;

/// Collaborator traits
pub mod effects;

/// Unified error handling
pub mod errors;

/// Account, keyset and relationship identifiers
pub mod identifiers;

/// Public keys, private keys and signatures
pub mod keys;

/// Keysets, key bundles and the keybox
pub mod keyset;

/// Delay-and-notify recovery domain
pub mod recovery;

/// Serde helpers
pub mod serialization;

/// Cancellation tokens
pub mod task;

pub use config::RecoveryConfig;
pub use crypto::{Csek, SealedCsek, SealedData, SealedKey, SealedSsek, Ssek, SymmetricKey};
pub use errors::{CustodyError, CustodyResult, ErrorClass};
pub use identifiers::{FullAccountId, LocalId, RelationshipId, ServerKeysetId};
pub use keys::{
    AppAuthKeypair, AppGlobalAuthKeyHwSignature, AppGlobalAuthPublicKey, AppRecoveryAuthPublicKey,
    AppSpendingKeypair, AppSpendingPublicKey, AuthPublicKey, DelegatedDecryptionKeypair,
    DelegatedDecryptionPublicKey, DescriptorPublicKey, HwAuthPublicKey, HwFactorProofOfPossession,
    HwSpendingPublicKey, PrivateKey, ServerSpendingPublicKey, Signature,
};
pub use keyset::{
    AppKeyBundle, BitcoinNetworkType, DescriptorBackup, FullAccountConfig, HwKeyBundle, Keybox,
    ServerKeyset, SpendingKeyset, WalletKind,
};
pub use recovery::{
    CompleteDelayNotifyChallenge, DestinationAuthKeys, LocalRecovery,
    LocalRecoveryAttemptProgress, PhysicalFactor, ProgressStep, Recovery, ServerRecovery,
    SignedChallenge, StillRecovering,
};
pub use task::{run_until_cancelled, CancellationToken};
