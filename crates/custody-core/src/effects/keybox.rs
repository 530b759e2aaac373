//! Active keybox access

use crate::keys::AppGlobalAuthKeyHwSignature;
use crate::keyset::Keybox;
use crate::recovery::DestinationAuthKeys;
use crate::CustodyResult;
use async_trait::async_trait;

/// Storage for the active full-account keybox.
#[async_trait]
pub trait KeyboxStore: Send + Sync {
    /// Active keybox, `None` while no full account is active.
    async fn active_keybox(&self) -> CustodyResult<Option<Keybox>>;

    /// Swap the active keybox's auth keys for `keys`.
    async fn rotate_keybox_auth_keys(
        &self,
        keys: &DestinationAuthKeys,
        hw_signature: &AppGlobalAuthKeyHwSignature,
    ) -> CustodyResult<Keybox>;
}
