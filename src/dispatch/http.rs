use crate::dispatch::wire::TransportResponse;
use crate::dispatch::AnalysisTransport;
use crate::error::AnalysisError;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Connection settings for the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the analysis service (default: "http://127.0.0.1:8000")
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Path to the SQLite history database (default: "history.db")
    pub history_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 30,
            history_path: "history.db".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64, history_path: impl Into<String>) -> Self {
        ServiceConfig {
            base_url: base_url.into(),
            timeout_seconds,
            history_path: history_path.into(),
        }
    }

    /// Joins the base URL and an endpoint path.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

/// reqwest-backed transport posting JSON to the analysis service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: ServiceConfig,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    /// Returns a network error if the HTTP client cannot be created.
    pub fn new(config: ServiceConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AnalysisError::network(format!("client creation failed: {}", e)))?;

        Ok(HttpTransport { client, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

impl AnalysisTransport for HttpTransport {
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<TransportResponse, AnalysisError> {
        let url = self.config.url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalysisError::network(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::network(format!("reading response from {}: {}", url, e)))?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_url_joining() {
        let config = ServiceConfig::new("http://localhost:8000/", 5, "history.db");
        assert_eq!(
            config.url("/analysis/crosstab"),
            "http://localhost:8000/analysis/crosstab"
        );
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new(ServiceConfig::default()).unwrap();
        assert_eq!(transport.config().timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Port 9 (discard) is closed on test machines.
        let config = ServiceConfig::new("http://127.0.0.1:9", 2, ":memory:");
        let transport = HttpTransport::new(config).unwrap();
        let err = transport
            .post_json("/analysis/top-n", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
    }
}
