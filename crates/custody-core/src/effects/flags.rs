//! Feature flags read by the core

/// Read-only flags consumed by keyset creation.
pub trait FeatureFlags: Send + Sync {
    /// Prefer delegated ("private") keysets on creation.
    fn private_wallet_delegation_enabled(&self) -> bool;

    /// Migrate to a private wallet while recovering.
    fn auto_migrate_private_wallet_on_recovery(&self) -> bool;
}

/// Fixed flag values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticFeatureFlags {
    /// Value of [`FeatureFlags::private_wallet_delegation_enabled`]
    pub private_wallet_delegation: bool,
    /// Value of [`FeatureFlags::auto_migrate_private_wallet_on_recovery`]
    pub auto_migrate_on_recovery: bool,
}

impl FeatureFlags for StaticFeatureFlags {
    fn private_wallet_delegation_enabled(&self) -> bool {
        self.private_wallet_delegation
    }

    fn auto_migrate_private_wallet_on_recovery(&self) -> bool {
        self.auto_migrate_on_recovery
    }
}
