//! Custody Recovery - delay-and-notify orchestration
//!
//! - [`orchestrator`]: drives a recovery started on this device from the end
//!   of the delay period to a fully active keyset
//! - [`synchronizer`]: keeps the published [`Recovery`](custody_core::Recovery)
//!   in line with the server
//! - [`state`]: the watch cell both publish to
//! - [`lock`]: the recovery-wide lock both take before mutating
//!
//! Build one [`RecoveryLock`] and one [`RecoveryStatusCell`] per account and
//! hand clones to both the orchestrator and the synchronizer.

#![forbid(unsafe_code)]

pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod synchronizer;

pub use error::{RecoveryError, RecoveryResult};
pub use lock::{RecoveryLock, RecoveryLockGuard};
pub use orchestrator::{
    DelayNotifyOrchestrator, RecoveryCollaborators, RecoveryStep, RelationshipFailure,
    RelationshipRemoval, TrustedContactRegeneration,
};
pub use progress::ProgressRecorder;
pub use state::RecoveryStatusCell;
pub use synchronizer::RecoveryStatusSynchronizer;
