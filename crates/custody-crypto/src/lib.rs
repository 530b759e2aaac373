//! Custody Crypto - symmetric sealing for backups and descriptors
//!
//! - [`XChaChaEncryptor`]: the production [`SymmetricKeyEncryptor`]
//! - [`SealedEnvelope`]: ciphertext bound to one [`SealingPurpose`], so a
//!   descriptor backup can never be opened as an account-key bundle
//!
//! [`SymmetricKeyEncryptor`]: custody_core::effects::SymmetricKeyEncryptor

#![forbid(unsafe_code)]

/// Purpose-bound sealed envelopes
pub mod envelope;

/// XChaCha20-Poly1305 encryptor and key generation
pub mod sealing;

pub use envelope::{AccountKeysPurpose, DescriptorPurpose, SealedEnvelope, SealingPurpose};
pub use sealing::{generate_symmetric_key, XChaChaEncryptor, NONCE_LEN};
