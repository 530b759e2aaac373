//! Public keys, private key material and signatures
//!
//! Public keys are kept in their textual wire form. Spending keys are
//! descriptor public keys (origin + extended key + wildcard path) because they
//! are embedded verbatim into watching descriptors. Auth keys are hex-encoded
//! compressed secp256k1 points.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

macro_rules! text_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap the textual key.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the textual key.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

text_key!(
    /// Descriptor public key, e.g. `[deadbeef/84'/1'/0']tpubD6Nz…/*`.
    DescriptorPublicKey
);

macro_rules! spending_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub DescriptorPublicKey);

        impl $name {
            /// Wrap a descriptor public key string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(DescriptorPublicKey::new(value))
            }

            /// The key as it appears inside a descriptor.
            pub fn dpub(&self) -> &DescriptorPublicKey {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

spending_key!(
    /// Spending key held by the mobile application.
    AppSpendingPublicKey
);
spending_key!(
    /// Spending key held by the hardware device.
    HwSpendingPublicKey
);
spending_key!(
    /// Spending key held by the server.
    ServerSpendingPublicKey
);

text_key!(
    /// Untyped auth public key; the storage key for auth keypairs.
    AuthPublicKey
);

macro_rules! auth_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub AuthPublicKey);

        impl $name {
            /// Wrap a hex-encoded public key.
            pub fn new(value: impl Into<String>) -> Self {
                Self(AuthPublicKey::new(value))
            }

            /// Erase the role of this key.
            pub fn as_auth_key(&self) -> &AuthPublicKey {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

auth_key!(
    /// App key used for globally scoped authentication.
    AppGlobalAuthPublicKey
);
auth_key!(
    /// App key used only for recovery-scoped authentication.
    AppRecoveryAuthPublicKey
);
auth_key!(
    /// Hardware authentication key.
    HwAuthPublicKey
);

text_key!(
    /// Public half of the delegated-decryption keypair used by social recovery.
    DelegatedDecryptionPublicKey
);

text_key!(
    /// Hex-encoded signature.
    Signature
);

/// Hardware signature over the app global auth key, binding the two factors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppGlobalAuthKeyHwSignature(pub Signature);

impl AppGlobalAuthKeyHwSignature {
    /// Wrap a hex-encoded signature.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Signature::new(value))
    }
}

/// Hardware signature over an access token proving current control of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwFactorProofOfPossession {
    /// Signature produced by the hardware.
    pub hw_signature: Signature,
}

/// Private key material in its textual form (xprv or hex scalar).
///
/// Zeroized on drop; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// Wrap secret key text.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret. Callers must not log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// App spending keypair, keyed by its public half in the private-key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpendingKeypair {
    /// Public descriptor key.
    pub public_key: AppSpendingPublicKey,
    /// Extended private key.
    pub private_key: PrivateKey,
}

/// App authentication keypair (global or recovery scoped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAuthKeypair {
    /// Public key.
    pub public_key: AuthPublicKey,
    /// Private scalar.
    pub private_key: PrivateKey,
}

/// Keypair used to decrypt social-recovery material delegated to this account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedDecryptionKeypair {
    /// Public key shared with trusted contacts.
    pub public_key: DelegatedDecryptionPublicKey,
    /// Private key.
    pub private_key: PrivateKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_key_debug_is_redacted() {
        let key = PrivateKey::new("xprv9s21ZrQH143K");
        assert_eq!(format!("{key:?}"), "PrivateKey(<redacted>)");
    }

    #[test]
    fn typed_auth_keys_share_storage_key() {
        let global = AppGlobalAuthPublicKey::new("02aa");
        assert_eq!(global.as_auth_key(), &AuthPublicKey::new("02aa"));
    }
}
