//! Descriptor backups
//!
//! The server stores one SSEK-sealed watching descriptor per keyset so a
//! recovering app can rebuild its keyset history.

pub mod grammar;
pub mod service;

pub use grammar::{build_descriptor, parse_descriptor, DescriptorKeys};
pub use service::{DescriptorBackupPreparedData, DescriptorBackupService};
