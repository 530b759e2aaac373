//! Software stand-in for the hardware device

use async_trait::async_trait;
use custody_core::effects::{AccessToken, HardwareTransport};
use custody_core::{CustodyError, CustodyResult, SealedKey, Signature, SymmetricKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::fault::Faults;

#[derive(Debug, Default)]
struct DeviceState {
    sealed: HashMap<SealedKey, SymmetricKey>,
    next_handle: u32,
    tap_delay: Duration,
}

/// Fake hardware. Sealed handles are opaque counters; signatures are
/// deterministic text derived from the signed bytes.
#[derive(Debug, Default)]
pub struct FakeHardware {
    state: Mutex<DeviceState>,
    pub faults: Faults,
}

impl FakeHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call wait this long, as if the user had not tapped yet.
    pub fn set_tap_delay(&self, delay: Duration) {
        self.state.lock().tap_delay = delay;
    }

    /// Signature the device produces over `challenge`.
    pub fn expected_signature(challenge: &[u8]) -> Signature {
        Signature::new(format!("hw:{}", hex::encode(challenge)))
    }

    async fn tap(&self, op: &str) -> CustodyResult<()> {
        let delay = self.state.lock().tap_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.faults.check(op)
    }
}

#[async_trait]
impl HardwareTransport for FakeHardware {
    async fn seal_key(&self, key: &SymmetricKey) -> CustodyResult<SealedKey> {
        self.tap("seal_key").await?;
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = SealedKey::new(format!("hw-sealed-{}", state.next_handle).into_bytes());
        state.sealed.insert(handle.clone(), key.clone());
        Ok(handle)
    }

    async fn unseal_key(&self, sealed: &SealedKey) -> CustodyResult<SymmetricKey> {
        self.tap("unseal_key").await?;
        self.state
            .lock()
            .sealed
            .get(sealed)
            .cloned()
            .ok_or_else(|| CustodyError::crypto("sealed key was not sealed by this device"))
    }

    async fn sign_challenge(&self, challenge: &[u8]) -> CustodyResult<Signature> {
        self.tap("sign_challenge").await?;
        Ok(Self::expected_signature(challenge))
    }

    async fn sign_access_token(&self, token: &AccessToken) -> CustodyResult<Signature> {
        self.tap("sign_access_token").await?;
        Ok(Signature::new(format!(
            "hw-pop:{}",
            hex::encode(token.raw().as_bytes())
        )))
    }
}
