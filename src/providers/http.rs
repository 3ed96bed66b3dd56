// reqwest-backed provider transport
//
// Exactly one attempt per call. Any retry policy belongs to the caller.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::types::OutboundRequest;
use super::ProviderClient;
use crate::errors::{DispatchError, Result};

#[derive(Clone)]
pub struct HttpProviderClient {
    client: Client,
}

impl HttpProviderClient {
    /// Build a client. Without a timeout the transport default applies.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn send(&self, provider: &str, request: &OutboundRequest) -> Result<Value> {
        tracing::debug!(
            provider = %provider,
            url = %request.url,
            headers = ?request.redacted_headers(),
            "Sending request to provider API"
        );

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| DispatchError::ProviderCallFailed {
                provider: provider.to_string(),
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %provider, status = %status, "Provider API request failed");
            return Err(DispatchError::ProviderCallFailed {
                provider: provider.to_string(),
                status: Some(status.as_u16()),
                body: error_body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DispatchError::malformed(provider, format!("body is not JSON: {}", e)))?;

        tracing::debug!(provider = %provider, status = %status, "Received provider response");
        Ok(body)
    }
}
