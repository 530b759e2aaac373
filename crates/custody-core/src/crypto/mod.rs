//! Symmetric key material shared by the backup and recovery components

pub mod symmetric;

pub use symmetric::{
    Csek, SealedCsek, SealedData, SealedKey, SealedSsek, Ssek, SymmetricKey, SYMMETRIC_KEY_LEN,
};
