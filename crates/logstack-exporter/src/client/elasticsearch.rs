//! Elasticsearch `_search` client

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{BackendError, SearchBackend, SearchRequest, SearchResponse};
use crate::config::BackendSettings;

/// Elasticsearch client with optional basic auth
pub struct ElasticsearchClient {
    base_url: reqwest::Url,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ElasticsearchClient {
    /// Build a client from backend settings
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        if settings.insecure_skip_verify {
            tracing::warn!(
                url = %settings.url,
                "TLS certificate verification is disabled for the search backend"
            );
        }

        let base_url = reqwest::Url::parse(settings.url.trim())
            .map_err(|e| BackendError::Build(format!("invalid url '{}': {}", settings.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Build(format!(
                "url '{}' cannot carry an index path",
                settings.url
            )));
        }

        let timeout = settings.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .build()
            .map_err(|e| BackendError::Build(e.to_string()))?;

        Ok(Self {
            base_url,
            username: settings
                .has_credentials()
                .then(|| settings.username.clone()),
            password: (!settings.password.is_empty()).then(|| settings.password.clone()),
            client,
            timeout,
        })
    }

    /// `{base}/{index}/_search`, with the index percent-encoded as one segment
    fn search_url(&self, index: &str) -> Result<reqwest::Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Build(format!("url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(index)
            .push("_search");
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn error_from(response: reqwest::Response) -> BackendError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        BackendError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn run_query(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        let url = self.search_url(index)?;

        let response = self
            .authorize(self.client.post(url))
            .json(&request.to_body())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let raw: RawSearchResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(raw.into())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.get(self.base_url.clone()))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// `hits.total` is a bare number before 7.0 and an object since
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object { value: u64 },
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}

impl From<RawSearchResponse> for SearchResponse {
    fn from(raw: RawSearchResponse) -> Self {
        let total_hits = match raw.hits.total {
            Some(RawTotal::Count(n)) | Some(RawTotal::Object { value: n }) => n,
            None => raw.hits.hits.len() as u64,
        };

        SearchResponse {
            total_hits,
            hits: raw.hits.hits.into_iter().map(|h| h.source).collect(),
        }
    }
}
