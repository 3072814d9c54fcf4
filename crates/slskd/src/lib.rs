//! Client for the slskd REST API.
//!
//! [`SlskdApi`] is the seam the rest of the workspace talks to; [`SlskdClient`]
//! implements it over HTTP.

mod client;
mod error;
pub mod models;
#[cfg(feature = "testkit")]
pub mod testkit;

pub use crate::client::SlskdClient;
pub use crate::error::SlskdError;
pub use crate::models::{
    count_files, DirectoryTransferGroup, DownloadRequest, PeerFile, SearchRequest, SearchResponse,
    SearchState, Transfer, UserTransferGroup,
};

use async_trait::async_trait;
use std::time::Duration;

/// Operations the bridge needs from the transfer backend.
#[async_trait]
pub trait SlskdApi: Send + Sync {
    /// Submit a search that slskd keeps open for `budget`. Returns the search id.
    async fn start_search(&self, query: &str, budget: Duration) -> Result<String, SlskdError>;

    /// Fetch the current state of a search, optionally with every peer response.
    async fn get_search(&self, id: &str, include_responses: bool)
        -> Result<SearchState, SlskdError>;

    /// Remove a search from slskd.
    async fn delete_search(&self, id: &str) -> Result<(), SlskdError>;

    /// Queue downloads of `files` from peer `owner`.
    async fn enqueue_downloads(
        &self,
        owner: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError>;

    /// Snapshot of every download slskd knows about, grouped by peer and directory.
    async fn list_downloads(&self) -> Result<Vec<UserTransferGroup>, SlskdError>;

    /// Cancel an active download, then remove its record.
    async fn cancel_download(&self, owner: &str, transfer_id: &str) -> Result<(), SlskdError>;
}
