//! Identifier types shared by the recovery and backup components
//!
//! Server-issued identifiers are opaque strings. Local identifiers are UUIDs;
//! restoration derives them deterministically so repeated restores agree.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace for deterministic local id derivation.
const LOCAL_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c6f_6361_6c2d_6964_2d6e_616d_6573_7063);

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a server-issued identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

server_id!(
    /// Account identifier assigned by the backend for a full (spending) account.
    FullAccountId
);

server_id!(
    /// Server-side identifier of a spending keyset. Uniqueness is enforced by the server.
    ServerKeysetId
);

server_id!(
    /// Identifier of a trusted-contact or protected-customer relationship.
    RelationshipId
);

/// Locally generated identifier for keysets and key bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub Uuid);

impl LocalId {
    /// Create a new random local id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable local id from labelled parts.
    ///
    /// Used when the same input must always map to the same id, e.g. restoring
    /// one backup twice.
    pub fn derived(parts: &[&str]) -> Self {
        let joined = parts.join("\u{1f}");
        Self(Uuid::new_v5(&LOCAL_ID_NAMESPACE, joined.as_bytes()))
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
