//! `wsh(sortedmulti(2,<app>,<hardware>,<server>))`
//!
//! Produced byte-for-byte as existing backups expect. Parsing is strict: the
//! threshold must be 2 and there must be exactly three non-empty keys.

use custody_core::{
    AppSpendingPublicKey, HwSpendingPublicKey, ServerSpendingPublicKey, SpendingKeyset,
};

use crate::error::DescriptorBackupError;

const PREFIX: &str = "wsh(sortedmulti(";
const SUFFIX: &str = "))";
const THRESHOLD: &str = "2";

/// The three keys of a watching descriptor, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorKeys {
    /// App key (first)
    pub app: AppSpendingPublicKey,
    /// Hardware key (second)
    pub hardware: HwSpendingPublicKey,
    /// Server key (third)
    pub server: ServerSpendingPublicKey,
}

/// Watching descriptor for `keyset`.
pub fn build_descriptor(keyset: &SpendingKeyset) -> String {
    format!(
        "{PREFIX}{THRESHOLD},{},{},{}{SUFFIX}",
        keyset.app_key, keyset.hardware_key, keyset.server_keyset.server_public_key
    )
}

/// Parse a watching descriptor. A trailing `#checksum` is tolerated.
pub fn parse_descriptor(descriptor: &str) -> Result<DescriptorKeys, DescriptorBackupError> {
    let body = descriptor
        .split_once('#')
        .map_or(descriptor, |(body, _checksum)| body)
        .trim();

    let inner = body
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .ok_or_else(|| {
            DescriptorBackupError::decryption("descriptor is not wsh(sortedmulti(...))")
        })?;

    let mut parts = inner.split(',');
    if parts.next() != Some(THRESHOLD) {
        return Err(DescriptorBackupError::decryption(
            "descriptor threshold must be 2",
        ));
    }

    let keys: Vec<&str> = parts.collect();
    if keys.len() != 3 {
        return Err(DescriptorBackupError::decryption(format!(
            "descriptor must contain exactly 3 keys, found {}",
            keys.len()
        )));
    }
    if keys.iter().any(|k| k.is_empty() || k.contains(['(', ')'])) {
        return Err(DescriptorBackupError::decryption("descriptor key is malformed"));
    }

    Ok(DescriptorKeys {
        app: AppSpendingPublicKey::new(keys[0]),
        hardware: HwSpendingPublicKey::new(keys[1]),
        server: ServerSpendingPublicKey::new(keys[2]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use custody_testkit::fixtures;

    #[test]
    fn builds_canonical_order() {
        let keyset = fixtures::spending_keyset(1);
        let descriptor = build_descriptor(&keyset);
        assert_eq!(
            descriptor,
            format!(
                "wsh(sortedmulti(2,{},{},{}))",
                keyset.app_key, keyset.hardware_key, keyset.server_keyset.server_public_key
            )
        );
    }

    #[test]
    fn parses_what_it_builds() {
        let keyset = fixtures::spending_keyset(4);
        let keys = parse_descriptor(&build_descriptor(&keyset)).unwrap();
        assert_eq!(keys.app, keyset.app_key);
        assert_eq!(keys.hardware, keyset.hardware_key);
        assert_eq!(keys.server, keyset.server_keyset.server_public_key);
    }

    #[test]
    fn tolerates_checksum() {
        let keyset = fixtures::spending_keyset(1);
        let with_checksum = format!("{}#8dhf3k2q", build_descriptor(&keyset));
        assert!(parse_descriptor(&with_checksum).is_ok());
    }

    #[test]
    fn wrong_key_counts_fail() {
        for descriptor in [
            "wsh(sortedmulti(2,a,b))",
            "wsh(sortedmulti(2,a,b,c,d))",
            "wsh(sortedmulti(2))",
            "wsh(sortedmulti(2,a,,c))",
        ] {
            assert_matches!(
                parse_descriptor(descriptor),
                Err(DescriptorBackupError::Decryption { .. }),
                "{descriptor}"
            );
        }
    }

    #[test]
    fn wrong_shape_fails() {
        for descriptor in [
            "sh(sortedmulti(2,a,b,c))",
            "wsh(multi(2,a,b,c))",
            "wsh(sortedmulti(3,a,b,c))",
            "wsh(sortedmulti(2,a,b,c)",
            "",
        ] {
            assert!(parse_descriptor(descriptor).is_err(), "{descriptor}");
        }
    }
}
