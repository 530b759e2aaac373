//! Sealed-secret stores
//!
//! Each store maps a hardware-sealed handle to its unsealed key once a hardware
//! tap has produced it. Only the sealed handle is meaningful outside the store.

use crate::crypto::{Csek, SealedCsek, SealedSsek, Ssek};
use crate::CustodyResult;
use async_trait::async_trait;

/// Sealed-to-unsealed CSEK pairs.
#[async_trait]
pub trait CsekStore: Send + Sync {
    /// Unsealed key for `sealed`, or `None` when no tap has produced it here.
    async fn get(&self, sealed: &SealedCsek) -> CustodyResult<Option<Csek>>;

    /// Remember the unsealed key for `sealed`.
    async fn set(&self, sealed: &SealedCsek, key: Csek) -> CustodyResult<()>;

    /// Forget every pair.
    async fn clear(&self) -> CustodyResult<()>;
}

/// Sealed-to-unsealed SSEK pairs.
#[async_trait]
pub trait SsekStore: Send + Sync {
    /// Unsealed key for `sealed`, or `None` when no tap has produced it here.
    async fn get(&self, sealed: &SealedSsek) -> CustodyResult<Option<Ssek>>;

    /// Remember the unsealed key for `sealed`.
    async fn set(&self, sealed: &SealedSsek, key: Ssek) -> CustodyResult<()>;

    /// Forget every pair.
    async fn clear(&self) -> CustodyResult<()>;
}
