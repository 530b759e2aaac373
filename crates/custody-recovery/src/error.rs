//! Recovery error type

use custody_backup::DescriptorBackupError;
use custody_core::effects::AuthTokenScope;
use custody_core::{CustodyError, ErrorClass, PhysicalFactor};

/// Failures of recovery orchestration and synchronization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    /// The current recovery is not one this device is driving
    #[error("recovery not in progress (current state: {state})")]
    NotInProgress {
        /// Name of the state that was found instead
        state: &'static str,
    },

    /// A step ran before the step it depends on was committed
    #[error("{step} requires {required} progress first")]
    MissingPrerequisite {
        /// Step that was attempted
        step: &'static str,
        /// Progress it depends on
        required: &'static str,
    },

    /// Attempt to record progress lower than what is already committed
    #[error("progress {attempted} cannot follow committed {committed}")]
    ProgressRegression {
        /// Committed progress
        committed: &'static str,
        /// Rejected progress
        attempted: &'static str,
    },

    /// The server delay period has not elapsed yet
    #[error("delay period ends in {remaining_secs}s")]
    DelayPending {
        /// Seconds left
        remaining_secs: u64,
    },

    /// Completion challenge was signed by the wrong factor
    #[error("challenge signed by {signer}, expected {expected}")]
    WrongSigner {
        /// Factor whose signature is required
        expected: PhysicalFactor,
        /// Factor that signed
        signer: PhysicalFactor,
    },

    /// Signed challenge is not this recovery's completion challenge
    #[error("signed challenge does not match the recovery's completion challenge")]
    ChallengeMismatch,

    /// Auth keys were rotated but re-authenticating with them failed
    #[error("auth keys rotated but {scope:?} authentication failed: {source}")]
    VerificationFailed {
        /// Scope that failed
        scope: AuthTokenScope,
        /// Underlying failure
        #[source]
        source: CustodyError,
    },

    /// Descriptor backup step failed
    #[error(transparent)]
    Descriptor(#[from] DescriptorBackupError),

    /// A collaborator call failed
    #[error("{step} failed: {source}")]
    Collaborator {
        /// Operation that failed
        step: &'static str,
        /// Underlying failure
        #[source]
        source: CustodyError,
    },

    /// The user left the flow
    #[error("recovery operation cancelled")]
    Cancelled,
}

impl RecoveryError {
    /// Wrap a collaborator failure, keeping cancellation distinct.
    pub(crate) fn at(step: &'static str) -> impl FnOnce(CustodyError) -> Self {
        move |source| match source {
            CustodyError::Cancelled { .. } => Self::Cancelled,
            source => Self::Collaborator { step, source },
        }
    }

    /// Taxonomy class used to pick retry-vs-abort.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotInProgress { .. }
            | Self::MissingPrerequisite { .. }
            | Self::ProgressRegression { .. }
            | Self::DelayPending { .. }
            | Self::WrongSigner { .. }
            | Self::ChallengeMismatch => ErrorClass::Precondition,
            Self::VerificationFailed { source, .. } | Self::Collaborator { source, .. } => {
                source.class()
            }
            Self::Descriptor(err) => err.class(),
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Whether the same call may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// Whether the account's auth keys may already have been rotated.
    pub fn is_post_rotation(&self) -> bool {
        matches!(self, Self::VerificationFailed { .. })
    }
}

/// Result alias for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;
