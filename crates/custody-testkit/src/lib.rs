//! Custody Testkit - in-memory collaborators and fixtures
//!
//! Every collaborator trait in `custody_core::effects` has an in-memory
//! implementation here. Each fake owns a [`Faults`] table so tests can inject
//! failures per operation and count calls.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

pub mod auth;
pub mod fault;
pub mod fixtures;
pub mod hardware;
pub mod relationships;
pub mod server;
pub mod storage;
pub mod time;

pub use auth::{FakeAccountAuthenticator, FakeAppAuthKeySigner};
pub use fault::Faults;
pub use hardware::FakeHardware;
pub use relationships::FakeRelationshipsService;
pub use server::FakeBackend;
pub use storage::{
    MemoryAuthTokenStore, MemoryCsekStore, MemoryKeyboxStore, MemoryPrivateKeyStore,
    MemoryRecoveryDao, MemorySsekStore,
};
pub use time::ManualClock;

/// Install a test subscriber printing `tracing` output; repeated calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
