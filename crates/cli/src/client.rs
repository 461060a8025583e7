//! API client for the cost-finalization service

use anyhow::{Context, Result};
use async_trait::async_trait;
use capacity_core::finalize::{FinalizeRequest, FinalizeResponse};
use capacity_core::{CapacityError, CostService, NamespaceRequest};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const FINALIZE_PATH: &str = "api/finalize-cost";

/// API client for the cost service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a POST request with JSON body
    ///
    /// Every failure, including a non-2xx status, is a transport error.
    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> capacity_core::Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| CapacityError::Transport(format!("invalid path {}: {}", path, e)))?;

        debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CapacityError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CapacityError::Transport(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CapacityError::Transport(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CostService for ApiClient {
    async fn finalize(
        &self,
        results: &[NamespaceRequest],
    ) -> capacity_core::Result<FinalizeResponse> {
        let request = FinalizeRequest {
            results: results.to_vec(),
        };
        self.post(FINALIZE_PATH, &request).await
    }
}
