//! Symmetric keys and their sealed forms
//!
//! A CSEK or SSEK exists unsealed only in process memory after a hardware
//! round trip. The sealed handle is the only representation that is persisted
//! or sent to the server.

use crate::serialization::base64_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Length of every symmetric key handled by the core.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// 256-bit symmetric key, zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Zeroizing<[u8; SYMMETRIC_KEY_LEN]>);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Build from a slice, rejecting any length other than 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; SYMMETRIC_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self::from_bytes(array))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Key material sealed by the hardware device. Opaque to the app.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedKey(#[serde(with = "base64_bytes")] Vec<u8>);

impl SealedKey {
    /// Wrap sealed bytes returned by the hardware.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Sealed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SealedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedKey({}…)", hex::encode(&self.0[..self.0.len().min(4)]))
    }
}

macro_rules! storage_key {
    ($(#[$meta:meta])* $key:ident, $(#[$sealed_meta:meta])* $sealed:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $key(pub SymmetricKey);

        impl $key {
            /// The underlying symmetric key.
            pub fn key(&self) -> &SymmetricKey {
                &self.0
            }
        }

        impl AsRef<SymmetricKey> for $key {
            fn as_ref(&self) -> &SymmetricKey {
                &self.0
            }
        }

        $(#[$sealed_meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $sealed(pub SealedKey);

        impl $sealed {
            /// Wrap sealed bytes.
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(SealedKey::new(bytes))
            }

            /// The opaque sealed handle.
            pub fn sealed_key(&self) -> &SealedKey {
                &self.0
            }
        }
    };
}

storage_key!(
    /// Cloud Storage Encryption Key: encrypts the full account key backup.
    Csek,
    /// Hardware-sealed CSEK, persisted inside the cloud backup.
    SealedCsek
);

storage_key!(
    /// Spending-descriptor Storage Encryption Key: encrypts descriptor backups.
    Ssek,
    /// Hardware-sealed SSEK, stored by the server next to descriptor backups.
    SealedSsek
);

/// Ciphertext produced by the symmetric encryptor.
///
/// The ciphertext includes the authentication tag; the AAD is not stored and
/// must be supplied again on unseal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedData {
    /// Ciphertext with appended tag
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Nonce used for this encryption
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

impl fmt::Debug for SealedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedData")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce_len", &self.nonce.len())
            .finish()
    }
}
