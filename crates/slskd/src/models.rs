//! Wire types exchanged with the slskd REST API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on files a single search may collect on the slskd side.
pub const SEARCH_FILE_LIMIT: u32 = 10_000;

/// Upper bound on peer responses a single search may collect.
pub const SEARCH_RESPONSE_LIMIT: u32 = 100;

/// Payload posted to `api/v0/searches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub search_text: String,
    /// Milliseconds slskd keeps the search open.
    pub search_timeout: u64,
    pub file_limit: u32,
    pub filter_responses: bool,
    pub response_limit: u32,
    pub minimum_response_file_count: u32,
    pub maximum_peer_queue_length: u32,
    pub minimum_peer_upload_speed: u64,
}

impl SearchRequest {
    pub fn new(search_text: impl Into<String>, budget: Duration) -> Self {
        Self {
            search_text: search_text.into(),
            search_timeout: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            file_limit: SEARCH_FILE_LIMIT,
            filter_responses: true,
            response_limit: SEARCH_RESPONSE_LIMIT,
            minimum_response_file_count: 1,
            maximum_peer_queue_length: 1_000_000,
            minimum_peer_upload_speed: 0,
        }
    }
}

/// State of a search job as reported by slskd.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub id: String,
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub response_count: u64,
    #[serde(default)]
    pub file_count: u64,
    /// Only populated when requested with `includeResponses=true`.
    #[serde(default)]
    pub responses: Vec<SearchResponse>,
}

/// Files offered by one peer in answer to a search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub username: String,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub files: Vec<PeerFile>,
    #[serde(default)]
    pub locked_file_count: u64,
    #[serde(default)]
    pub locked_files: Vec<PeerFile>,
    #[serde(default)]
    pub has_free_upload_slot: bool,
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub queue_length: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerFile {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub bit_rate: Option<u32>,
    #[serde(default)]
    pub bit_depth: Option<u32>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Duration in seconds, for media files.
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub extension: Option<String>,
}

/// One entry of the body posted to `api/v0/transfers/downloads/{username}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub filename: String,
    pub size: u64,
}

impl DownloadRequest {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            size,
        }
    }
}

/// A single transfer known to slskd.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub direction: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub bytes_transferred: u64,
    #[serde(default)]
    pub average_speed: f64,
    /// Compound state string, e.g. `"Completed, Succeeded"` or `"Queued, Remotely"`.
    #[serde(default)]
    pub state: String,
}

/// Downloads grouped under the peer they come from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTransferGroup {
    pub username: String,
    #[serde(default)]
    pub directories: Vec<DirectoryTransferGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryTransferGroup {
    pub directory: String,
    #[serde(default)]
    pub files: Vec<Transfer>,
}

/// Total number of files across a set of search responses, locked ones included.
pub fn count_files(responses: &[SearchResponse]) -> usize {
    responses
        .iter()
        .map(|r| r.files.len() + r.locked_files.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_wire_format() {
        let request = SearchRequest::new("some album", Duration::from_secs(24));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["searchText"], "some album");
        assert_eq!(json["searchTimeout"], 24_000);
        assert_eq!(json["fileLimit"], 10_000);
        assert_eq!(json["filterResponses"], true);
        assert_eq!(json["responseLimit"], 100);
        assert_eq!(json["minimumResponseFileCount"], 1);
        assert_eq!(json["maximumPeerQueueLength"], 1_000_000);
        assert_eq!(json["minimumPeerUploadSpeed"], 0);
    }

    #[test]
    fn test_search_state_without_responses() {
        let raw = r#"{
            "id": "7a0c5c2e-1111-4a4a-9c9c-000000000001",
            "searchText": "query",
            "state": "InProgress",
            "isComplete": false,
            "responseCount": 3,
            "fileCount": 42
        }"#;
        let state: SearchState = serde_json::from_str(raw).unwrap();

        assert!(!state.is_complete);
        assert_eq!(state.file_count, 42);
        assert!(state.responses.is_empty());
    }

    #[test]
    fn test_transfer_snapshot_parsing() {
        let raw = r#"[{
            "username": "peer",
            "directories": [{
                "directory": "music\\album",
                "files": [{
                    "id": "b3c1",
                    "username": "peer",
                    "direction": "Download",
                    "filename": "music\\album\\01.flac",
                    "size": 1000,
                    "bytesTransferred": 400,
                    "averageSpeed": 1234.5,
                    "state": "InProgress"
                }]
            }]
        }]"#;
        let groups: Vec<UserTransferGroup> = serde_json::from_str(raw).unwrap();
        let file = &groups[0].directories[0].files[0];

        assert_eq!(file.filename, "music\\album\\01.flac");
        assert_eq!(file.bytes_transferred, 400);
        assert_eq!(file.state, "InProgress");
    }

    #[test]
    fn test_count_files_includes_locked() {
        let responses = vec![
            SearchResponse {
                username: "a".into(),
                files: vec![PeerFile::default(), PeerFile::default()],
                locked_files: vec![PeerFile::default()],
                ..Default::default()
            },
            SearchResponse {
                username: "b".into(),
                files: vec![PeerFile::default()],
                ..Default::default()
            },
        ];
        assert_eq!(count_files(&responses), 4);
        assert_eq!(count_files(&[]), 0);
    }
}
