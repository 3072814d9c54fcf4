//! Caller-facing operations that touch both the registry and slskd.

use crate::error::TransferError;
use crate::registry::TransferRegistry;
use slskrr_slskd::{DownloadRequest, SlskdApi};
use slskrr_token::IdentityToken;
use std::sync::Arc;
use tracing::{info, warn};

/// Queues, cancels and retries downloads.
#[derive(Clone)]
pub struct TransferService {
    api: Arc<dyn SlskdApi>,
    registry: TransferRegistry,
}

impl TransferService {
    pub fn new(api: Arc<dyn SlskdApi>, registry: TransferRegistry) -> Self {
        Self { api, registry }
    }

    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    /// Queue the file referenced by `token` and return its tracking id.
    ///
    /// A file that is already queued or downloading is not submitted twice;
    /// the existing id is returned instead. Nothing is tracked if slskd
    /// refuses the download.
    pub async fn enqueue(&self, token: &str, category: &str) -> Result<String, TransferError> {
        let file = IdentityToken::decode(token)?;

        if let Some(existing) = self.registry.find_active(&file.owner, &file.resource_path) {
            info!(
                "Download of {} from {} already tracked as {}",
                file.resource_path, file.owner, existing.id
            );
            return Ok(existing.id);
        }

        info!(
            "Queueing download of {} ({} bytes) from {} in category {:?}",
            file.resource_path, file.size_bytes, file.owner, category
        );
        self.submit(&file.owner, &file.resource_path, file.size_bytes)
            .await?;

        let id = self.registry.create(
            file.owner,
            file.resource_path.clone(),
            file.size_bytes,
            category,
        );
        info!("Download queued as {} ({})", id, file.resource_path);
        Ok(id)
    }

    /// Stop tracking a download, cancelling it on slskd when its handle is known.
    ///
    /// The cancel request is best-effort; the entry is removed either way.
    pub async fn cancel(&self, id: &str) -> Result<(), TransferError> {
        let transfer = self
            .registry
            .get(id)
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;

        if let Some(handle) = &transfer.backend_transfer_handle {
            if let Err(err) = self.api.cancel_download(&transfer.owner, handle).await {
                warn!("Failed to cancel slskd transfer {} for {}: {}", handle, id, err);
            }
        }

        self.registry.remove(id);
        info!("Removed download {}", id);
        Ok(())
    }

    /// Retry a download, re-submitting it to slskd if the retry budget allows.
    ///
    /// `Ok(false)` means the budget is spent and the transfer stays as it was.
    pub async fn retry(&self, id: &str) -> Result<bool, TransferError> {
        let transfer = self
            .registry
            .get(id)
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;

        if !self.registry.retry(id) {
            warn!(
                "Download {} exhausted its {} retries",
                id, transfer.max_retries
            );
            return Ok(false);
        }

        self.submit(&transfer.owner, &transfer.resource_path, transfer.size_bytes)
            .await?;
        info!("Retrying download {} ({})", id, transfer.resource_path);
        Ok(true)
    }

    async fn submit(
        &self,
        owner: &str,
        resource_path: &str,
        size_bytes: u64,
    ) -> Result<(), TransferError> {
        let request = [DownloadRequest::new(resource_path, size_bytes)];
        self.api.enqueue_downloads(owner, &request).await?;
        Ok(())
    }
}
