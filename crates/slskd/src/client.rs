use crate::error::SlskdError;
use crate::models::{DownloadRequest, SearchRequest, SearchState, UserTransferGroup};
use crate::SlskdApi;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_KEY_HEADER: &str = "X-API-Key";

/// Pause between cancelling a transfer and removing its record.
const CANCEL_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// HTTP client for a slskd instance.
#[derive(Clone)]
pub struct SlskdClient {
    base_url: Url,
    api_key: String,
    http: Client,
}

impl SlskdClient {
    /// Create a new client for the given base URL (e.g. `http://localhost:5030/`).
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self, SlskdError> {
        Self::with_http_client(
            base_url,
            api_key,
            Client::builder().timeout(Duration::from_secs(60)).build()?,
        )
    }

    /// Use an existing reqwest client (useful for custom TLS or middleware).
    pub fn with_http_client(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        http: Client,
    ) -> Result<Self, SlskdError> {
        let url = Url::parse(base_url.as_ref())
            .map_err(|_| SlskdError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if url.cannot_be_a_base() {
            return Err(SlskdError::InvalidBaseUrl(base_url.as_ref().to_string()));
        }
        Ok(Self {
            base_url: url,
            api_key: api_key.into(),
            http,
        })
    }

    /// Expose the underlying base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch slskd's runtime options document.
    pub async fn get_options(&self) -> Result<serde_json::Value, SlskdError> {
        let url = self.endpoint(&["api", "v0", "options"])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::json_response(response, &[StatusCode::OK]).await
    }

    /// Directory slskd writes completed downloads to.
    pub async fn download_dir(&self) -> Result<String, SlskdError> {
        let options = self.get_options().await?;
        let directories = options
            .get("directories")
            .and_then(|value| value.as_object())
            .ok_or_else(|| SlskdError::parse_error("directories not found in options"))?;
        directories
            .get("downloads")
            .and_then(|value| value.as_str())
            .map(str::to_owned)
            .ok_or_else(|| SlskdError::parse_error("downloads directory not found in options"))
    }

    /// Build an endpoint URL below the base, percent-encoding every segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SlskdError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SlskdError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_key)
    }

    async fn json_response<T>(response: Response, accepted: &[StatusCode]) -> Result<T, SlskdError>
    where
        T: DeserializeOwned,
    {
        let response = Self::check_status(response, accepted).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(
        response: Response,
        accepted: &[StatusCode],
    ) -> Result<Response, SlskdError> {
        if accepted.contains(&response.status()) {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes).to_string();
        Err(SlskdError::server_error(status, text))
    }
}

#[async_trait]
impl SlskdApi for SlskdClient {
    async fn start_search(&self, query: &str, budget: Duration) -> Result<String, SlskdError> {
        let url = self.endpoint(&["api", "v0", "searches"])?;
        let body = SearchRequest::new(query, budget);
        let response = self
            .authorized(self.http.post(url).json(&body))
            .send()
            .await?;
        let state: SearchState =
            Self::json_response(response, &[StatusCode::OK, StatusCode::CREATED]).await?;
        Ok(state.id)
    }

    async fn get_search(
        &self,
        id: &str,
        include_responses: bool,
    ) -> Result<SearchState, SlskdError> {
        let mut url = self.endpoint(&["api", "v0", "searches", id])?;
        if include_responses {
            url.query_pairs_mut()
                .append_pair("includeResponses", "true");
        }
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::json_response(response, &[StatusCode::OK]).await
    }

    async fn delete_search(&self, id: &str) -> Result<(), SlskdError> {
        let url = self.endpoint(&["api", "v0", "searches", id])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        Self::check_status(response, &[StatusCode::OK, StatusCode::NO_CONTENT]).await?;
        Ok(())
    }

    async fn enqueue_downloads(
        &self,
        owner: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError> {
        let url = self.endpoint(&["api", "v0", "transfers", "downloads", owner])?;
        let response = self
            .authorized(self.http.post(url).json(files))
            .send()
            .await?;
        Self::check_status(
            response,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )
        .await?;
        Ok(())
    }

    async fn list_downloads(&self) -> Result<Vec<UserTransferGroup>, SlskdError> {
        let url = self.endpoint(&["api", "v0", "transfers", "downloads"])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::json_response(response, &[StatusCode::OK]).await
    }

    async fn cancel_download(&self, owner: &str, transfer_id: &str) -> Result<(), SlskdError> {
        let cancel_url =
            self.endpoint(&["api", "v0", "transfers", "downloads", owner, transfer_id])?;

        let response = self
            .authorized(self.http.delete(cancel_url.clone()))
            .send()
            .await?;
        debug!(
            "Cancel of transfer {} for {} returned {}",
            transfer_id,
            owner,
            response.status()
        );

        tokio::time::sleep(CANCEL_SETTLE_DELAY).await;

        let mut remove_url = cancel_url;
        remove_url.query_pairs_mut().append_pair("remove", "true");
        let response = self.authorized(self.http.delete(remove_url)).send().await?;
        debug!(
            "Removal of transfer {} for {} returned {}",
            transfer_id,
            owner,
            response.status()
        );

        Ok(())
    }
}
