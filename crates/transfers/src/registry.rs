//! In-memory registry of downloads handed to slskd.
//!
//! The registry is volatile and lives for the lifetime of the process. All
//! access goes through a single reader/writer lock; every read hands out a
//! copy so callers never observe a record changing underneath them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Prefix of download ids, matching SABnzbd's `nzo_id` convention.
pub const TRANSFER_ID_PREFIX: &str = "SABnzbd_nzo_";

/// Retry budget given to new transfers.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle of a tracked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransferStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
}

impl TransferStatus {
    /// Completed and Failed are terminal; only an explicit retry leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Queued => "Queued",
            TransferStatus::Downloading => "Downloading",
            TransferStatus::Completed => "Completed",
            TransferStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedTransfer {
    pub id: String,
    pub owner: String,
    pub resource_path: String,
    pub size_bytes: u64,
    pub category: String,
    pub bytes_transferred: u64,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    /// Set on the first move into a terminal status, cleared by retry.
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// slskd's own id for the transfer, once known.
    pub backend_transfer_handle: Option<String>,
}

impl TrackedTransfer {
    /// Percentage of the file received; 0 for empty files.
    pub fn progress_percent(&self) -> f64 {
        if self.size_bytes == 0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / self.size_bytes as f64 * 100.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Concurrent store of tracked transfers.
#[derive(Clone)]
pub struct TransferRegistry {
    transfers: Arc<RwLock<HashMap<String, TrackedTransfer>>>,
    max_retries: u32,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }

    /// Registry whose new entries allow `max_retries` retries.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            transfers: Arc::new(RwLock::new(HashMap::new())),
            max_retries,
        }
    }

    /// Start tracking a download in the Queued state and return its id.
    pub fn create(
        &self,
        owner: impl Into<String>,
        resource_path: impl Into<String>,
        size_bytes: u64,
        category: impl Into<String>,
    ) -> String {
        let mut transfers = self.transfers.write();
        let id = loop {
            let candidate = generate_id();
            if !transfers.contains_key(&candidate) {
                break candidate;
            }
        };

        transfers.insert(
            id.clone(),
            TrackedTransfer {
                id: id.clone(),
                owner: owner.into(),
                resource_path: resource_path.into(),
                size_bytes,
                category: category.into(),
                bytes_transferred: 0,
                status: TransferStatus::Queued,
                created_at: Utc::now(),
                completed_at: None,
                retry_count: 0,
                max_retries: self.max_retries,
                backend_transfer_handle: None,
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<TrackedTransfer> {
        self.transfers.read().get(id).cloned()
    }

    /// Record progress reported by slskd. Unknown ids are ignored.
    pub fn update_progress(&self, id: &str, bytes_transferred: u64, status: TransferStatus) {
        let mut transfers = self.transfers.write();
        let Some(transfer) = transfers.get_mut(id) else {
            return;
        };
        transfer.bytes_transferred = bytes_transferred;
        transfer.status = status;
        if status.is_terminal() && transfer.completed_at.is_none() {
            transfer.completed_at = Some(Utc::now());
        }
    }

    /// Spend one retry on a transfer.
    ///
    /// Returns `false` once the budget is exhausted (or the id is unknown); the
    /// entry then keeps its current status for good. Otherwise the transfer is
    /// reset to Queued with no bytes, no completion time and no backend handle,
    /// since the re-submitted download gets a new id on slskd.
    pub fn retry(&self, id: &str) -> bool {
        let mut transfers = self.transfers.write();
        let Some(transfer) = transfers.get_mut(id) else {
            return false;
        };
        transfer.retry_count = transfer.retry_count.saturating_add(1);
        if transfer.retry_count > transfer.max_retries {
            return false;
        }
        transfer.status = TransferStatus::Queued;
        transfer.bytes_transferred = 0;
        transfer.completed_at = None;
        transfer.backend_transfer_handle = None;
        true
    }

    /// Remember slskd's id for a transfer so it can be cancelled later.
    pub fn set_backend_handle(&self, id: &str, handle: impl Into<String>) {
        if let Some(transfer) = self.transfers.write().get_mut(id) {
            transfer.backend_transfer_handle = Some(handle.into());
        }
    }

    pub fn remove(&self, id: &str) {
        self.transfers.write().remove(id);
    }

    /// Transfers that are Queued or Downloading, oldest first.
    pub fn list_queue(&self) -> Vec<TrackedTransfer> {
        self.collect(|transfer| !transfer.is_terminal())
    }

    /// Transfers that are Completed or Failed, oldest first.
    pub fn list_history(&self) -> Vec<TrackedTransfer> {
        self.collect(TrackedTransfer::is_terminal)
    }

    pub fn list_all(&self) -> Vec<TrackedTransfer> {
        self.collect(|_| true)
    }

    /// The Queued or Downloading transfer for the given peer file, if any.
    ///
    /// Finished entries for the same file are skipped.
    pub fn find_active(&self, owner: &str, resource_path: &str) -> Option<TrackedTransfer> {
        self.transfers
            .read()
            .values()
            .find(|transfer| {
                !transfer.is_terminal()
                    && transfer.owner == owner
                    && transfer.resource_path == resource_path
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.transfers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.read().is_empty()
    }

    fn collect<F>(&self, keep: F) -> Vec<TrackedTransfer>
    where
        F: Fn(&TrackedTransfer) -> bool,
    {
        let mut results: Vec<TrackedTransfer> = self
            .transfers
            .read()
            .values()
            .filter(|transfer| keep(transfer))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        results
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_id() -> String {
    let bytes: [u8; 8] = rand::random();
    format!("{TRANSFER_ID_PREFIX}{}", hex::encode(bytes))
}
