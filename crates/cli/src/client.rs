//! API client for communicating with the colocation agent

use anyhow::{Context, Result};
use colocation::health::{HealthResponse, ReadinessResponse};
use colocation::models::{ConfigSnapshot, ErrorResponse, NodeStrategy, NodeSummary};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// API client for the agent HTTP API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// GET a JSON body; statuses listed in `accept` are decoded like 2xx
    async fn fetch<T: DeserializeOwned>(&self, url: Url, accept: &[StatusCode]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && !accept.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(self.url(path)?, &[]).await
    }

    pub async fn node_strategy(&self, node: &str) -> Result<NodeStrategy> {
        let mut url = self.url("v1/nodes/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API URL cannot be a base"))?
            .pop_if_empty()
            .extend([node, "strategy"]);
        self.fetch(url, &[]).await
    }

    pub async fn nodes(&self, selector: Option<&str>) -> Result<Vec<NodeSummary>> {
        let mut url = self.url("v1/nodes")?;
        if let Some(selector) = selector {
            url.query_pairs_mut().append_pair("selector", selector);
        }
        self.fetch(url, &[]).await
    }

    pub async fn config(&self) -> Result<ConfigSnapshot> {
        self.get("v1/config").await
    }

    /// Health report; a 503 still carries the component breakdown
    pub async fn health(&self) -> Result<HealthResponse> {
        self.fetch(self.url("healthz")?, &[StatusCode::SERVICE_UNAVAILABLE])
            .await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        self.fetch(self.url("readyz")?, &[StatusCode::SERVICE_UNAVAILABLE])
            .await
    }
}
