use crate::delay::{adaptive_delay, search_progress};
use crate::error::SearchError;
use slskrr_slskd::models::SEARCH_FILE_LIMIT;
use slskrr_slskd::{count_files, SearchResponse, SlskdApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning knobs for [`SearchCoordinator`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Wait before the first poll.
    pub initial_delay: Duration,
    /// File count treated as a saturated search when pacing polls.
    pub file_cap: u64,
    /// Share of the caller's timeout handed to slskd as its own search budget.
    pub backend_budget_ratio: f64,
    /// Upper bound on the background deletion of a finished search.
    pub cleanup_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            file_cap: u64::from(SEARCH_FILE_LIMIT),
            backend_budget_ratio: 0.8,
            cleanup_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs searches on slskd and waits for their results.
#[derive(Clone)]
pub struct SearchCoordinator {
    api: Arc<dyn SlskdApi>,
    config: SearchConfig,
}

impl SearchCoordinator {
    pub fn new(api: Arc<dyn SlskdApi>) -> Self {
        Self::with_config(api, SearchConfig::default())
    }

    pub fn with_config(api: Arc<dyn SlskdApi>, config: SearchConfig) -> Self {
        Self { api, config }
    }

    /// Submit `query` and wait until slskd reports completion or `timeout` elapses.
    ///
    /// Hitting the deadline is not an error: the responses gathered so far are
    /// returned, possibly none. Cancelling `cancel` aborts the wait with
    /// [`SearchError::Cancelled`] without fetching results. Cancellation is
    /// observed between polls, an in-flight request is allowed to finish.
    ///
    /// The remote search is deleted in the background once the wait ends, on a
    /// task that outlives both the caller and `cancel`.
    pub async fn search_and_wait(
        &self,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResponse>, SearchError> {
        let budget = timeout.mul_f64(self.config.backend_budget_ratio);
        let search_id = self
            .api
            .start_search(query, budget)
            .await
            .map_err(SearchError::Submission)?;
        debug!("Started search {} for {:?}", search_id, query);

        let result = self.wait_for_results(&search_id, query, timeout, cancel).await;
        self.spawn_cleanup(search_id);
        result
    }

    async fn wait_for_results(
        &self,
        search_id: &str,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResponse>, SearchError> {
        let deadline = Instant::now() + timeout;
        let mut delay = self.config.initial_delay;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Search {} cancelled by caller", search_id);
                    return Err(SearchError::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    warn!(
                        "Search {} for {:?} timed out, returning partial results",
                        search_id, query
                    );
                    let responses = self.fetch_responses(search_id).await?;
                    info!(
                        "Search {} partial results: {} responses, {} files",
                        search_id,
                        responses.len(),
                        count_files(&responses)
                    );
                    return Ok(responses);
                }
                _ = sleep(delay) => {
                    let state = self
                        .api
                        .get_search(search_id, false)
                        .await
                        .map_err(SearchError::Transport)?;
                    debug!(
                        "Search {} poll: state={} complete={} responses={} files={}",
                        search_id,
                        state.state,
                        state.is_complete,
                        state.response_count,
                        state.file_count
                    );

                    if state.is_complete {
                        let responses = self.fetch_responses(search_id).await?;
                        info!(
                            "Search {} completed ({}): {} responses, {} files",
                            search_id,
                            state.state,
                            responses.len(),
                            count_files(&responses)
                        );
                        return Ok(responses);
                    }

                    delay = adaptive_delay(search_progress(state.file_count, self.config.file_cap));
                }
            }
        }
    }

    async fn fetch_responses(&self, search_id: &str) -> Result<Vec<SearchResponse>, SearchError> {
        let state = self
            .api
            .get_search(search_id, true)
            .await
            .map_err(SearchError::Transport)?;
        Ok(state.responses)
    }

    fn spawn_cleanup(&self, search_id: String) {
        let api = Arc::clone(&self.api);
        let limit = self.config.cleanup_timeout;
        tokio::spawn(async move {
            match timeout(limit, api.delete_search(&search_id)).await {
                Ok(Ok(())) => debug!("Deleted search {}", search_id),
                Ok(Err(err)) => warn!("Failed to delete search {}: {}", search_id, err),
                Err(_) => warn!("Deleting search {} timed out after {:?}", search_id, limit),
            }
        });
    }
}
