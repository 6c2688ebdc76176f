//! Remote Call boundary.
//!
//! The engine never speaks a wire protocol itself. It hands a client
//! configuration, a method name and a parameter object to a [`RemoteCall`]
//! implementation and gets back an arbitrarily shaped JSON response.

pub mod http;

pub use http::HttpRemote;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Failure reported by a Remote Call implementation.
///
/// `retryable` errors are retried by the page-level retry policy; anything
/// else goes straight to the schema's error hook and then fails the request.
#[derive(Debug, Clone)]
pub struct RemoteError {
    /// Human-readable message
    pub message: String,

    /// Provider error code (e.g. `Throttling`, `AccessDenied`), if known
    pub code: Option<String>,

    /// Whether the page-level retry policy may try again
    pub retryable: bool,

    /// Response body accompanying the error, if any
    pub response: Option<Value>,
}

impl RemoteError {
    /// Transient failure eligible for retry.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: true,
            response: None,
        }
    }

    /// Failure that retrying will not fix.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: false,
            response: None,
        }
    }

    /// Attach a provider error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the response body that came with the error.
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Client construction details for one fetch.
///
/// Built once per pagination chain from the schema's namespace details and
/// the request's ambient configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service namespace (e.g. `EC2`, `Organizations`)
    pub namespace: String,

    /// Merged constructor arguments (credentials, region, ...)
    pub args: Value,
}

/// Asynchronous capability that executes a named remote method.
///
/// No ordering is guaranteed between distinct invocations; implementations
/// must be safe to call concurrently.
///
/// # Example
///
/// ```rust,ignore
/// struct Fixed;
///
/// #[async_trait]
/// impl RemoteCall for Fixed {
///     async fn invoke(&self, _: &ClientConfig, _: &str, _: &Value) -> Result<Value, RemoteError> {
///         Ok(json!({"Items": []}))
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Invoke `method` with `params` using a client built from `client`.
    async fn invoke(
        &self,
        client: &ClientConfig,
        method: &str,
        params: &Value,
    ) -> std::result::Result<Value, RemoteError>;
}
