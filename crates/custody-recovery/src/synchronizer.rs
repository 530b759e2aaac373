//! Recovery status synchronization
//!
//! Polls the server for the canonical recovery record, persists it, and
//! publishes the merge with local progress. A failed poll keeps the last
//! published value; the next attempt waits for the regular cadence.

use custody_core::effects::{KeyboxStore, RecoveryDao, RecoveryServer, TimeEffects};
use custody_core::{CancellationToken, FullAccountId, Recovery, RecoveryConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RecoveryError, RecoveryResult};
use crate::lock::RecoveryLock;
use crate::state::RecoveryStatusCell;

/// Keeps [`RecoveryStatusCell`] in line with the server.
#[derive(Clone)]
pub struct RecoveryStatusSynchronizer {
    server: Arc<dyn RecoveryServer>,
    dao: Arc<dyn RecoveryDao>,
    keybox_store: Arc<dyn KeyboxStore>,
    time: Arc<dyn TimeEffects>,
    lock: RecoveryLock,
    status: RecoveryStatusCell,
    config: RecoveryConfig,
}

impl RecoveryStatusSynchronizer {
    /// Create a synchronizer sharing `lock` and `status` with the orchestrator.
    pub fn new(
        server: Arc<dyn RecoveryServer>,
        dao: Arc<dyn RecoveryDao>,
        keybox_store: Arc<dyn KeyboxStore>,
        time: Arc<dyn TimeEffects>,
        lock: RecoveryLock,
        status: RecoveryStatusCell,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            server,
            dao,
            keybox_store,
            time,
            lock,
            status,
            config,
        }
    }

    /// Status cell this synchronizer publishes to.
    pub fn status(&self) -> &RecoveryStatusCell {
        &self.status
    }

    /// Account to poll: the active full account, otherwise the account of a
    /// lost-app recovery in progress on this device.
    async fn account_to_sync(&self) -> RecoveryResult<Option<FullAccountId>> {
        if let Some(keybox) = self
            .keybox_store
            .active_keybox()
            .await
            .map_err(RecoveryError::at("active_keybox"))?
        {
            return Ok(Some(keybox.full_account_id));
        }
        Ok(self
            .dao
            .local_recovery()
            .await
            .map_err(RecoveryError::at("recovery_dao.local_recovery"))?
            .map(|local| local.full_account_id))
    }

    /// Run one sync cycle under the recovery lock.
    ///
    /// On a failed fetch the published value is kept, unless nothing has been
    /// published yet, in which case the persisted records are published.
    pub async fn sync_once(&self) -> RecoveryResult<Recovery> {
        let _guard = self.lock.acquire().await;

        let Some(account_id) = self.account_to_sync().await? else {
            debug!("no account to sync recovery status for");
            return self.status.republish_from(self.dao.as_ref()).await;
        };

        let server = match self.server.recovery_status(&account_id).await {
            Ok(server) => server,
            Err(source) => {
                warn!(%account_id, error = %source, "recovery status fetch failed; keeping last value");
                if self.status.current() == Recovery::Loading {
                    if let Err(err) = self.status.republish_from(self.dao.as_ref()).await {
                        warn!(error = %err, "could not publish persisted recovery records");
                    }
                }
                return Err(RecoveryError::at("recovery_status")(source));
            }
        };

        self.dao
            .set_active_server_recovery(server.as_ref())
            .await
            .map_err(RecoveryError::at("recovery_dao.set_active_server_recovery"))?;
        let local = self
            .dao
            .local_recovery()
            .await
            .map_err(RecoveryError::at("recovery_dao.local_recovery"))?;

        let recovery = Recovery::from_records(local, server);
        if recovery != self.status.current() {
            info!(%account_id, state = recovery.name(), "recovery status changed");
        }
        self.status.publish(recovery.clone());
        Ok(recovery)
    }

    /// Poll on the configured cadence while `foreground` is true, until
    /// `token` is cancelled or the foreground sender is dropped.
    pub fn spawn(
        self: Arc<Self>,
        mut foreground: watch::Receiver<bool>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = self.config.status_poll_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    closed = async { foreground.wait_for(|foregrounded| *foregrounded).await.is_err() } => {
                        if closed {
                            break;
                        }
                    }
                }

                if let Err(err) = self.sync_once().await {
                    debug!(error = %err, "sync cycle failed");
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = self.time.sleep(interval) => {}
                }
            }
            debug!("recovery status synchronizer stopped");
        })
    }
}

impl std::fmt::Debug for RecoveryStatusSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryStatusSynchronizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
