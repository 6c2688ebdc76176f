//! HTTP implementation of the Remote Call boundary.

use crate::remote::{ClientConfig, RemoteCall, RemoteError};
use crate::types::{CollectorError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Request body sent for every invocation.
#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    client: &'a Value,
    params: &'a Value,
}

/// Remote Call over JSON/HTTP.
///
/// Each invocation is `POST {endpoint}/{namespace}/{method}` with body
/// `{"client": <constructor args>, "params": <params>}`.
///
/// Status mapping:
/// - 2xx: response body is the result
/// - 429, 5xx, network failures: retryable `RemoteError`
/// - other 4xx: non-retryable `RemoteError`
pub struct HttpRemote {
    endpoint: String,
    client: Client,
}

impl HttpRemote {
    /// Create new HTTP remote.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL (e.g., "http://localhost:8080/api")
    ///
    /// # Returns
    ///
    /// New `HttpRemote`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if the HTTP client cannot be built
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, namespace: &str, method: &str) -> String {
        format!("{}/{}/{}", self.endpoint, namespace, method)
    }
}

#[async_trait]
impl RemoteCall for HttpRemote {
    async fn invoke(
        &self,
        client: &ClientConfig,
        method: &str,
        params: &Value,
    ) -> std::result::Result<Value, RemoteError> {
        let response = self
            .client
            .post(self.url(&client.namespace, method))
            .header("Content-Type", "application/json")
            .json(&InvokeRequest {
                client: &client.args,
                params,
            })
            .send()
            .await
            .map_err(|e| RemoteError::transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::transient(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            let mut err = RemoteError {
                message: format!("Remote error {}: {}", status, body),
                code: Some(status.as_u16().to_string()),
                retryable,
                response: None,
            };
            if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
                if let Some(code) = parsed.get("code").and_then(Value::as_str) {
                    err.code = Some(code.to_string());
                }
                err.response = Some(parsed);
            }
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::fatal(format!("Failed to parse response: {}\nBody: {}", e, body)))
    }
}
