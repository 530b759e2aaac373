//! Purpose-bound sealed envelopes
//!
//! Each feature that encrypts with a hardware-sealed key names a
//! [`SealingPurpose`]: the key type it accepts and the versioned AAD tag it
//! binds. Opening an envelope with the wrong purpose fails authentication even
//! if the key bytes happen to match.

use custody_core::effects::SymmetricKeyEncryptor;
use custody_core::{Csek, CustodyResult, SealedData, Ssek, SymmetricKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// A use of symmetric sealing: key type plus AAD tag.
pub trait SealingPurpose {
    /// Key accepted for this purpose.
    type Key: AsRef<SymmetricKey>;

    /// Versioned AAD tag.
    const AAD: &'static [u8];
}

/// Full account key bundle sealed with the CSEK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKeysPurpose {}

impl SealingPurpose for AccountKeysPurpose {
    type Key = Csek;
    const AAD: &'static [u8] = b"account-keys/v1";
}

/// Watching descriptor sealed with the SSEK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorPurpose {}

impl SealingPurpose for DescriptorPurpose {
    type Key = Ssek;
    const AAD: &'static [u8] = b"descriptor-backup/v1";
}

/// Ciphertext sealed for purpose `P`.
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct SealedEnvelope<P: SealingPurpose> {
    data: SealedData,
    #[serde(skip)]
    _purpose: PhantomData<fn() -> P>,
}

impl<P: SealingPurpose> SealedEnvelope<P> {
    /// Wrap ciphertext received from storage or the server.
    pub fn from_data(data: SealedData) -> Self {
        Self {
            data,
            _purpose: PhantomData,
        }
    }

    /// Raw ciphertext.
    pub fn data(&self) -> &SealedData {
        &self.data
    }

    /// Unwrap into raw ciphertext.
    pub fn into_data(self) -> SealedData {
        self.data
    }

    /// Seal raw bytes.
    pub fn seal(
        encryptor: &dyn SymmetricKeyEncryptor,
        key: &P::Key,
        plaintext: &[u8],
    ) -> CustodyResult<Self> {
        let data = encryptor.seal(plaintext, key.as_ref(), P::AAD)?;
        Ok(Self::from_data(data))
    }

    /// Open into raw bytes.
    pub fn open(&self, encryptor: &dyn SymmetricKeyEncryptor, key: &P::Key) -> CustodyResult<Vec<u8>> {
        encryptor
            .unseal(&self.data, key.as_ref(), P::AAD)
            .map_err(|error| {
                debug!(
                    purpose = %String::from_utf8_lossy(P::AAD),
                    %error,
                    "sealed envelope did not open"
                );
                error
            })
    }

    /// Serialize `value` as JSON and seal it.
    pub fn seal_json<T: Serialize>(
        encryptor: &dyn SymmetricKeyEncryptor,
        key: &P::Key,
        value: &T,
    ) -> CustodyResult<Self> {
        let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(value)?);
        Self::seal(encryptor, key, &plaintext)
    }

    /// Open and parse JSON.
    pub fn open_json<T: DeserializeOwned>(
        &self,
        encryptor: &dyn SymmetricKeyEncryptor,
        key: &P::Key,
    ) -> CustodyResult<T> {
        let plaintext = zeroize::Zeroizing::new(self.open(encryptor, key)?);
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl<P: SealingPurpose> Clone for SealedEnvelope<P> {
    fn clone(&self) -> Self {
        Self::from_data(self.data.clone())
    }
}

impl<P: SealingPurpose> PartialEq for SealedEnvelope<P> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<P: SealingPurpose> Eq for SealedEnvelope<P> {}

impl<P: SealingPurpose> fmt::Debug for SealedEnvelope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedEnvelope")
            .field("purpose", &String::from_utf8_lossy(P::AAD))
            .field("data", &self.data)
            .finish()
    }
}
