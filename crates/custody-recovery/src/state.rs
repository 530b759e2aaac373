//! The current [`Recovery`] value
//!
//! A watch channel holds the latest value so late subscribers see it
//! immediately. Only this crate publishes; everyone else observes.

use custody_core::effects::RecoveryDao;
use custody_core::Recovery;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{RecoveryError, RecoveryResult};

/// Last-value-wins broadcast of the current recovery state.
#[derive(Debug, Clone)]
pub struct RecoveryStatusCell {
    tx: Arc<watch::Sender<Recovery>>,
}

impl RecoveryStatusCell {
    /// Create a cell holding [`Recovery::Loading`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Recovery::Loading);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current value.
    pub fn current(&self) -> Recovery {
        self.tx.borrow().clone()
    }

    /// Observe changes; the current value is available immediately.
    pub fn subscribe(&self) -> watch::Receiver<Recovery> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, recovery: Recovery) {
        debug!(state = recovery.name(), "publishing recovery state");
        self.tx.send_replace(recovery);
    }

    /// Recompute from persisted records and publish.
    pub(crate) async fn republish_from(&self, dao: &dyn RecoveryDao) -> RecoveryResult<Recovery> {
        let local = dao
            .local_recovery()
            .await
            .map_err(RecoveryError::at("recovery_dao.local_recovery"))?;
        let server = dao
            .server_recovery()
            .await
            .map_err(RecoveryError::at("recovery_dao.server_recovery"))?;
        let recovery = Recovery::from_records(local, server);
        self.publish(recovery.clone());
        Ok(recovery)
    }
}

impl Default for RecoveryStatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_core::PhysicalFactor;

    #[test]
    fn late_subscribers_see_latest_value() {
        let cell = RecoveryStatusCell::new();
        assert_eq!(cell.current(), Recovery::Loading);

        cell.publish(Recovery::NoActiveRecovery);
        cell.publish(Recovery::SomeoneElseIsRecovering {
            factor_being_recovered: PhysicalFactor::App,
        });

        let rx = cell.subscribe();
        assert_eq!(
            *rx.borrow(),
            Recovery::SomeoneElseIsRecovering {
                factor_being_recovered: PhysicalFactor::App
            }
        );
    }
}
