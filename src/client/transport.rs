//! Transport seam between the request executor and the trends provider.
//!
//! The executor only needs "GET this descriptor and give me the status and
//! JSON body"; everything provider-specific about URLs and HTTP lives here.

use crate::config::ApiConfig;
use crate::error::{Result, TrendsError};
use crate::models::RequestDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Raw outcome of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Value,
}

impl RawResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the network call for a descriptor.
///
/// Implementations return `Err` only for transport failures (connection,
/// timeout, unreadable body). Status and payload interpretation belong to
/// the executor.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, descriptor: &RequestDescriptor) -> Result<RawResponse>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for HttpTransportConfig {
    fn from(api: &ApiConfig) -> Self {
        Self {
            base_url: api.base_url.clone(),
            timeout_seconds: api.timeout_seconds,
            user_agent: api.user_agent.clone(),
        }
    }
}

/// reqwest-backed transport talking to the provider over HTTP GET.
pub struct HttpTransport {
    config: HttpTransportConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TrendsError::network(format!("Failed to create HTTP client: {}", e), None))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Full endpoint URL for a descriptor, without the query string.
    pub fn endpoint_url(&self, descriptor: &RequestDescriptor) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            descriptor.endpoint().path()
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, descriptor: &RequestDescriptor) -> Result<RawResponse> {
        let url = self.endpoint_url(descriptor);
        let query = descriptor.query_pairs();

        debug!("GET {} with {} query entries", url, query.len());

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TrendsError::network(
                        format!("Request timed out after {}s", self.config.timeout_seconds),
                        None,
                    )
                } else if e.is_connect() {
                    TrendsError::network(
                        format!("Cannot connect to trends provider at {}", self.config.base_url),
                        None,
                    )
                } else {
                    TrendsError::network(format!("Failed to send request: {}", e), None)
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TrendsError::network(format!("Failed to read response: {}", e), Some(status.as_u16())))?;

        let body = if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                TrendsError::network(
                    format!("Response body is not valid JSON: {}", e),
                    Some(status.as_u16()),
                )
            })?
        } else {
            // Error bodies are informational only; keep whatever is there.
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EndpointKind;

    #[test]
    fn test_endpoint_url_joins_base_and_path() {
        let transport = HttpTransport::new(HttpTransportConfig {
            base_url: "http://localhost:5000/api/".to_string(),
            ..Default::default()
        })
        .unwrap();

        let descriptor = RequestDescriptor::new(EndpointKind::RealtimeTrendingSearches);
        assert_eq!(
            transport.endpoint_url(&descriptor),
            "http://localhost:5000/api/realtime_trending_searches"
        );
    }

    #[test]
    fn test_default_matches_api_config() {
        let api = ApiConfig::default();
        let config = HttpTransportConfig::default();
        assert_eq!(config.base_url, api.base_url);
        assert_eq!(config.timeout_seconds, api.timeout_seconds);
        assert_eq!(config.user_agent, api.user_agent);
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::ok(Value::Null).is_success());
        let failed = RawResponse {
            status: 503,
            status_text: "Service Unavailable".to_string(),
            body: Value::Null,
        };
        assert!(!failed.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_network_error() {
        let transport = HttpTransport::new(HttpTransportConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..Default::default()
        })
        .unwrap();

        let descriptor = RequestDescriptor::new(EndpointKind::Categories);
        let err = transport.fetch(&descriptor).await.unwrap_err();
        assert!(matches!(err, TrendsError::Network { status: None, .. }));
    }
}
