//! XChaCha20-Poly1305 sealing
//!
//! Random 24-byte nonces, so keys may be reused across many payloads. The AAD
//! is authenticated but never stored in [`SealedData`].

use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use custody_core::effects::SymmetricKeyEncryptor;
use custody_core::{CustodyError, CustodyResult, SealedData, SymmetricKey};
use tracing::warn;
use zeroize::Zeroize;

/// XChaCha20 nonce length.
pub const NONCE_LEN: usize = 24;

/// Production symmetric encryptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaChaEncryptor;

impl XChaChaEncryptor {
    /// Create a new encryptor
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &SymmetricKey) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
    }
}

impl SymmetricKeyEncryptor for XChaChaEncryptor {
    fn seal(&self, plaintext: &[u8], key: &SymmetricKey, aad: &[u8]) -> CustodyResult<SealedData> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = Self::cipher(key)
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CustodyError::crypto(format!("XChaCha20-Poly1305 encryption failed: {e}")))?;

        Ok(SealedData {
            ciphertext,
            nonce: nonce.to_vec(),
        })
    }

    fn unseal(
        &self,
        sealed: &SealedData,
        key: &SymmetricKey,
        aad: &[u8],
    ) -> CustodyResult<Vec<u8>> {
        if sealed.nonce.len() != NONCE_LEN {
            warn!(nonce_len = sealed.nonce.len(), "rejecting sealed data with malformed nonce");
            return Err(CustodyError::crypto(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                sealed.nonce.len()
            )));
        }
        let nonce = XNonce::from_slice(&sealed.nonce);

        Self::cipher(key)
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed.ciphertext,
                    aad,
                },
            )
            .map_err(|_| CustodyError::crypto("decryption failed: wrong key, AAD or ciphertext"))
    }
}

/// Fresh random symmetric key from the OS generator.
pub fn generate_symmetric_key() -> SymmetricKey {
    let mut bytes = [0u8; custody_core::crypto::SYMMETRIC_KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn seal_unseal_roundtrip() {
        let encryptor = XChaChaEncryptor::new();
        let key = generate_symmetric_key();
        let sealed = encryptor.seal(b"wsh(...)", &key, b"aad").unwrap();
        assert_eq!(sealed.nonce.len(), NONCE_LEN);
        assert_eq!(encryptor.unseal(&sealed, &key, b"aad").unwrap(), b"wsh(...)");
    }

    #[test]
    fn wrong_aad_fails() {
        let encryptor = XChaChaEncryptor::new();
        let key = generate_symmetric_key();
        let sealed = encryptor.seal(b"payload", &key, b"descriptor").unwrap();
        assert_matches!(
            encryptor.unseal(&sealed, &key, b"account"),
            Err(CustodyError::Crypto { .. })
        );
    }

    #[test]
    fn wrong_key_fails() {
        let encryptor = XChaChaEncryptor::new();
        let sealed = encryptor
            .seal(b"payload", &generate_symmetric_key(), b"")
            .unwrap();
        assert!(encryptor
            .unseal(&sealed, &generate_symmetric_key(), b"")
            .is_err());
    }

    #[test]
    fn truncated_nonce_is_rejected_without_panicking() {
        let encryptor = XChaChaEncryptor::new();
        let key = generate_symmetric_key();
        let mut sealed = encryptor.seal(b"payload", &key, b"").unwrap();
        sealed.nonce.truncate(12);
        assert_matches!(
            encryptor.unseal(&sealed, &key, b""),
            Err(CustodyError::Crypto { .. })
        );
    }

    #[test]
    fn nonces_differ_between_seals() {
        let encryptor = XChaChaEncryptor::new();
        let key = generate_symmetric_key();
        let a = encryptor.seal(b"same", &key, b"").unwrap();
        let b = encryptor.seal(b"same", &key, b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }
}
