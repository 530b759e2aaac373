//! Symmetric encryptor collaborator

use crate::crypto::{SealedData, SymmetricKey};
use crate::CustodyResult;

/// Authenticated symmetric encryption with additional authenticated data.
///
/// `unseal` must fail with [`CustodyError::Crypto`](crate::CustodyError::Crypto)
/// when the key, the AAD, or the ciphertext does not match.
pub trait SymmetricKeyEncryptor: Send + Sync {
    /// Encrypt `plaintext` under `key`, binding `aad`.
    fn seal(&self, plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> CustodyResult<SealedData>;

    /// Decrypt `sealed`, checking `aad`.
    fn unseal(&self, sealed: &SealedData, key: &SymmetricKey, aad: &[u8])
        -> CustodyResult<Vec<u8>>;
}
