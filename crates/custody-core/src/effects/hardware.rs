//! Hardware device transport
//!
//! Every call suspends until the user taps the device. Callers race these
//! calls against a [`CancellationToken`](crate::task::CancellationToken).

use crate::crypto::{SealedKey, SymmetricKey};
use crate::effects::auth::AccessToken;
use crate::keys::Signature;
use crate::CustodyResult;
use async_trait::async_trait;

/// Operations performed by the hardware factor.
#[async_trait]
pub trait HardwareTransport: Send + Sync {
    /// Seal a symmetric key so only this device can unseal it.
    async fn seal_key(&self, key: &SymmetricKey) -> CustodyResult<SealedKey>;

    /// Unseal a key previously sealed by this device.
    async fn unseal_key(&self, sealed: &SealedKey) -> CustodyResult<SymmetricKey>;

    /// Sign arbitrary challenge bytes with the hardware auth key.
    async fn sign_challenge(&self, challenge: &[u8]) -> CustodyResult<Signature>;

    /// Sign an access token as proof of possession.
    async fn sign_access_token(&self, token: &AccessToken) -> CustodyResult<Signature>;
}
