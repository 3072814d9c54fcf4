//! In-memory stand-in for slskd, for exercising callers without a network.

use crate::error::SlskdError;
use crate::models::{DownloadRequest, SearchResponse, SearchState, UserTransferGroup};
use crate::SlskdApi;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

const FAKE_SEARCH_ID: &str = "fake-search";

/// Scripted slskd double.
///
/// Search polls are served from a queue; once it drains, the last state is
/// repeated. Every mutating call is recorded for later assertions.
#[derive(Default)]
pub struct FakeSlskd {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    reject_searches: bool,
    polls: VecDeque<SearchState>,
    last_poll: Option<SearchState>,
    responses: Vec<SearchResponse>,
    downloads: Vec<UserTransferGroup>,
    fail_polls: bool,
    fail_fetches: bool,
    fail_listing: bool,
    fail_enqueue: bool,
    started: Vec<(String, Duration)>,
    polled: Vec<bool>,
    deleted: Vec<String>,
    enqueued: Vec<(String, Vec<DownloadRequest>)>,
    cancelled: Vec<(String, String)>,
}

impl FakeSlskd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start_search` fail with a server error.
    pub fn reject_searches(&self) {
        self.state.lock().reject_searches = true;
    }

    /// Queue one poll result reporting `file_count` files and completion.
    pub fn push_poll(&self, file_count: u64, is_complete: bool) {
        let state = if is_complete { "Completed" } else { "InProgress" };
        self.state.lock().polls.push_back(SearchState {
            id: FAKE_SEARCH_ID.to_string(),
            state: state.to_string(),
            is_complete,
            file_count,
            ..Default::default()
        });
    }

    /// Responses returned whenever a search is fetched with responses included.
    pub fn set_responses(&self, responses: Vec<SearchResponse>) {
        self.state.lock().responses = responses;
    }

    /// Make progress polls (`get_search` without responses) fail.
    pub fn fail_polls(&self, fail: bool) {
        self.state.lock().fail_polls = fail;
    }

    /// Make result fetches (`get_search` with responses) fail.
    pub fn fail_fetches(&self, fail: bool) {
        self.state.lock().fail_fetches = fail;
    }

    pub fn set_downloads(&self, downloads: Vec<UserTransferGroup>) {
        self.state.lock().downloads = downloads;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    pub fn fail_enqueue(&self, fail: bool) {
        self.state.lock().fail_enqueue = fail;
    }

    pub fn started_searches(&self) -> Vec<(String, Duration)> {
        self.state.lock().started.clone()
    }

    /// `include_responses` flag of every `get_search` call, in order.
    pub fn polls(&self) -> Vec<bool> {
        self.state.lock().polled.clone()
    }

    pub fn deleted_searches(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn enqueued(&self) -> Vec<(String, Vec<DownloadRequest>)> {
        self.state.lock().enqueued.clone()
    }

    pub fn cancelled(&self) -> Vec<(String, String)> {
        self.state.lock().cancelled.clone()
    }
}

#[async_trait]
impl SlskdApi for FakeSlskd {
    async fn start_search(&self, query: &str, budget: Duration) -> Result<String, SlskdError> {
        let mut state = self.state.lock();
        if state.reject_searches {
            return Err(SlskdError::server_error(409, "search rejected"));
        }
        state.started.push((query.to_string(), budget));
        Ok(FAKE_SEARCH_ID.to_string())
    }

    async fn get_search(
        &self,
        id: &str,
        include_responses: bool,
    ) -> Result<SearchState, SlskdError> {
        let mut state = self.state.lock();
        state.polled.push(include_responses);
        if include_responses && state.fail_fetches {
            return Err(SlskdError::server_error(502, "search fetch failed"));
        }
        if !include_responses && state.fail_polls {
            return Err(SlskdError::server_error(502, "search poll failed"));
        }
        if include_responses {
            let mut current = state.last_poll.clone().unwrap_or_default();
            current.id = id.to_string();
            current.responses = state.responses.clone();
            return Ok(current);
        }
        let next = match state.polls.pop_front() {
            Some(next) => next,
            None => state.last_poll.clone().unwrap_or_else(|| SearchState {
                id: id.to_string(),
                state: "InProgress".to_string(),
                ..Default::default()
            }),
        };
        state.last_poll = Some(next.clone());
        Ok(next)
    }

    async fn delete_search(&self, id: &str) -> Result<(), SlskdError> {
        self.state.lock().deleted.push(id.to_string());
        Ok(())
    }

    async fn enqueue_downloads(
        &self,
        owner: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError> {
        let mut state = self.state.lock();
        if state.fail_enqueue {
            return Err(SlskdError::server_error(500, "enqueue failed"));
        }
        state.enqueued.push((owner.to_string(), files.to_vec()));
        Ok(())
    }

    async fn list_downloads(&self) -> Result<Vec<UserTransferGroup>, SlskdError> {
        let state = self.state.lock();
        if state.fail_listing {
            return Err(SlskdError::server_error(503, "unavailable"));
        }
        Ok(state.downloads.clone())
    }

    async fn cancel_download(&self, owner: &str, transfer_id: &str) -> Result<(), SlskdError> {
        self.state
            .lock()
            .cancelled
            .push((owner.to_string(), transfer_id.to_string()));
        Ok(())
    }
}
