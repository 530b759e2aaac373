//! Custody Backup - encrypted key backups and descriptor backups
//!
//! - [`codec`]: versioned cloud backup envelope and the CSEK-sealed key bundle
//! - [`restorer`]: turns a backup into stored private keys and an
//!   [`AccountRestoration`](restorer::AccountRestoration)
//! - [`descriptor`]: the 2-of-3 watching descriptor grammar and the service
//!   that seals, unseals and uploads descriptor backups

#![forbid(unsafe_code)]

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod restorer;

pub use codec::{BackupCodec, BackupKeyset, BackupVersion, DecodedAccountKeys, FullAccountKeys, VersionedBackup};
pub use descriptor::{DescriptorBackupPreparedData, DescriptorBackupService};
pub use error::{CodecError, DescriptorBackupError, RestorerError};
pub use restorer::{AccountRestoration, KeyBackupRestorer};
