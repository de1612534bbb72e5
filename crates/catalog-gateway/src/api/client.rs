//! HTTP transport for the remote catalog.

use super::types::JikanError;
use crate::error::{GatewayError, GatewayResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::CatalogConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Query parameters forwarded verbatim to the HTTP layer
pub type Params = Vec<(String, String)>;

/// One GET against the catalog, returning the full JSON body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str, params: &Params) -> GatewayResult<Value>;
}

/// `reqwest`-backed transport with a fixed base URL
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Scheme, host and fixed path prefix
    base_url: String,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str, params: &Params) -> GatewayResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, params = ?params, "Making catalog request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Request error");
                GatewayError::Request(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        // Prefer the catalog's own message when it sent a structured error
        let body = serde_json::from_str::<JikanError>(&text)
            .map(|err| err.message)
            .unwrap_or(text);

        debug!(url = %url, status = %status, "Request failed");
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
