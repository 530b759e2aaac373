//! Error types for backup decoding, restoration and descriptor backups

use custody_core::{BitcoinNetworkType, CustodyError, ErrorClass, ServerKeysetId};

/// Backup payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Envelope version predates the supported formats
    #[error("unsupported backup version {0}")]
    UnsupportedVersion(u32),

    /// Envelope or key bundle JSON does not match the schema
    #[error("malformed backup payload: {0}")]
    Malformed(String),

    /// Envelope carries private key material outside the sealed bundle
    #[error("backup envelope carries {0} unsealed")]
    PlaintextKeyMaterial(&'static str),

    /// Key bundle failed authentication under the CSEK
    #[error("backup key bundle could not be decrypted: {0}")]
    Decryption(String),
}

impl CodecError {
    /// Every codec failure is terminal for its payload.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Format
    }

    /// Always false.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failures of [`KeyBackupRestorer::restore`](crate::restorer::KeyBackupRestorer::restore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestorerError {
    /// No unsealed CSEK is available for the backup's sealed CSEK
    #[error("sealed CSEK for this backup is not available locally")]
    PkekMissing,

    /// Backup decoded or decrypted incorrectly
    #[error("account backup could not be decoded: {0}")]
    AccountBackupDecoding(#[from] CodecError),

    /// Writing an app spending keypair failed
    #[error("failed to store app spending keypair: {0}")]
    AppSpendingKeypairStorage(#[source] CustodyError),

    /// Writing an app auth keypair failed
    #[error("failed to store app auth keypair: {0}")]
    AppAuthKeypairStorage(#[source] CustodyError),

    /// Writing the delegated-decryption keypair failed
    #[error("failed to store delegated decryption keypair: {0}")]
    RelationshipsKeyStorage(#[source] CustodyError),

    /// Looking up the CSEK failed
    #[error("failed to read sealed CSEK store: {0}")]
    SecretStore(#[source] CustodyError),
}

impl RestorerError {
    /// Taxonomy class used to pick retry-vs-abort.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PkekMissing => ErrorClass::MissingSecret,
            Self::AccountBackupDecoding(_) => ErrorClass::Format,
            Self::AppSpendingKeypairStorage(_)
            | Self::AppAuthKeypairStorage(_)
            | Self::RelationshipsKeyStorage(_) => ErrorClass::Storage,
            Self::SecretStore(source) => source.class(),
        }
    }

    /// Whether the same call may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}

/// Failures of the descriptor backup service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorBackupError {
    /// The sealed SSEK is known but its unsealed key is not stored locally
    #[error("SSEK not found locally; unseal it with the hardware")]
    SsekNotFound,

    /// Descriptor ciphertext, grammar or server state is inconsistent
    #[error("descriptor backup decryption error: {message}")]
    Decryption {
        /// What was wrong
        message: String,
    },

    /// Keyset is on a network the service does not seal for
    #[error("keyset {keyset_id} is on {found:?}, descriptors are sealed for {expected:?}")]
    NetworkMismatch {
        /// Offending keyset
        keyset_id: ServerKeysetId,
        /// Network of the service
        expected: BitcoinNetworkType,
        /// Network of the keyset
        found: BitcoinNetworkType,
    },

    /// A collaborator call failed
    #[error("{step} failed: {source}")]
    Collaborator {
        /// Operation that failed
        step: &'static str,
        /// Underlying failure
        #[source]
        source: CustodyError,
    },
}

impl DescriptorBackupError {
    pub(crate) fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    pub(crate) fn at(step: &'static str) -> impl FnOnce(CustodyError) -> Self {
        move |source| Self::Collaborator { step, source }
    }

    /// Taxonomy class used to pick retry-vs-abort.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SsekNotFound => ErrorClass::MissingSecret,
            Self::Decryption { .. } => ErrorClass::Format,
            Self::NetworkMismatch { .. } => ErrorClass::Precondition,
            Self::Collaborator { source, .. } => source.class(),
        }
    }

    /// Whether the same call may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
