//! Background sync of tracked transfers with slskd's transfer list.

use crate::registry::{TransferRegistry, TransferStatus};
use slskrr_slskd::{SlskdApi, SlskdError, Transfer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default pause between reconciliation passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Ordered substring rules for slskd's compound state strings. The first rule
/// whose needles all occur wins; anything unmatched is still queued.
const STATE_RULES: &[(&[&str], TransferStatus)] = &[
    (&["Completed", "Succeeded"], TransferStatus::Completed),
    (&["Completed"], TransferStatus::Failed),
    (&["InProgress"], TransferStatus::Downloading),
];

/// Map a slskd state such as `"Completed, Errored"` to a transfer status.
pub fn map_transfer_state(state: &str) -> TransferStatus {
    STATE_RULES
        .iter()
        .find(|(needles, _)| needles.iter().all(|needle| state.contains(needle)))
        .map(|(_, status)| *status)
        .unwrap_or(TransferStatus::Queued)
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Files present in slskd's snapshot.
    pub observed: usize,
    /// Non-terminal tracked transfers found in the snapshot and updated.
    pub updated: usize,
    /// Of those, how many reached a terminal status in this pass.
    pub finished: usize,
}

/// Periodically folds slskd's transfer snapshot into a [`TransferRegistry`].
pub struct TransferReconciler {
    api: Arc<dyn SlskdApi>,
    registry: TransferRegistry,
    interval: Duration,
}

impl TransferReconciler {
    pub fn new(api: Arc<dyn SlskdApi>, registry: TransferRegistry) -> Self {
        Self {
            api,
            registry,
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one pass: fetch the snapshot and update every matching live transfer.
    ///
    /// Transfers missing from the snapshot are left untouched.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport, SlskdError> {
        let groups = self.api.list_downloads().await?;

        let mut snapshot: HashMap<(&str, &str), &Transfer> = HashMap::new();
        for group in &groups {
            for directory in &group.directories {
                for file in &directory.files {
                    snapshot.insert((group.username.as_str(), file.filename.as_str()), file);
                }
            }
        }

        let mut report = ReconcileReport {
            observed: snapshot.len(),
            ..Default::default()
        };

        for tracked in self.registry.list_all() {
            if tracked.is_terminal() {
                continue;
            }
            let key = (tracked.owner.as_str(), tracked.resource_path.as_str());
            let Some(remote) = snapshot.get(&key) else {
                continue;
            };

            let status = map_transfer_state(&remote.state);
            self.registry
                .update_progress(&tracked.id, remote.bytes_transferred, status);
            if !remote.id.is_empty()
                && tracked.backend_transfer_handle.as_deref() != Some(remote.id.as_str())
            {
                self.registry.set_backend_handle(&tracked.id, remote.id.clone());
            }

            report.updated += 1;
            if status.is_terminal() {
                report.finished += 1;
                info!(
                    "Transfer {} ({}) finished as {}",
                    tracked.id, tracked.resource_path, status
                );
            }
        }

        debug!(
            "Reconciled {} tracked transfers against {} remote files",
            report.updated, report.observed
        );
        Ok(report)
    }

    /// Run passes on a fixed interval until `shutdown` fires.
    ///
    /// A failed pass is logged and retried on the next tick.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Transfer reconciler started (every {:?})", self.interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.reconcile_once().await {
                            error!("Failed to fetch slskd downloads: {}", err);
                        }
                    }
                }
            }

            info!("Transfer reconciler stopped");
        })
    }
}
