//! Per-request context.
//!
//! Carries the ambient client configuration (credentials, region, ...) and
//! the request's deadline and cancellation token through every resolution
//! and fetch call. The context is read-only once built.

use crate::remote::ClientConfig;
use crate::schema::Schema;
use crate::types::params::deep_merge;
use crate::types::{CollectorError, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context shared by every call made on behalf of one top-level request.
///
/// Cloning is cheap; clones share the same ambient configuration,
/// deadline and cancellation token.
#[derive(Debug, Clone)]
pub struct RequestContext {
    ambient: Arc<Value>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    request_id: Uuid,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with no ambient configuration and no deadline.
    pub fn new() -> Self {
        Self {
            ambient: Arc::new(Value::Object(Default::default())),
            deadline: None,
            cancel: CancellationToken::new(),
            request_id: Uuid::new_v4(),
        }
    }

    /// Set the ambient client configuration.
    pub fn with_ambient(mut self, ambient: Value) -> Self {
        self.ambient = Arc::new(ambient);
        self
    }

    /// Bound the request to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Bound the request to an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ambient client configuration.
    pub fn ambient(&self) -> &Value {
        &self.ambient
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Identifier attached to this request's spans.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Token that cancels every call made under this context.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every outstanding call made under this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Build the client configuration for one fetch of `schema`.
    ///
    /// The ambient configuration is deep-merged with the schema's
    /// constructor arguments; constructor arguments win on conflict.
    pub fn client_config(&self, schema: &Schema) -> ClientConfig {
        let mut args = self.ambient.as_ref().clone();
        if !args.is_object() {
            args = Value::Object(Default::default());
        }
        deep_merge(&mut args, &schema.namespace.constructor_args);

        ClientConfig {
            namespace: schema.namespace.name.clone(),
            args,
        }
    }

    /// Run `future` unless the deadline passes or the request is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::DeadlineExceeded` or `CollectorError::Cancelled`
    /// naming `schema`
    pub async fn guard<F, T>(&self, schema: &str, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(CollectorError::Cancelled {
                schema: schema.to_string(),
            });
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = future => Ok(output),
            _ = self.cancel.cancelled() => Err(CollectorError::Cancelled {
                schema: schema.to_string(),
            }),
            _ = deadline => Err(CollectorError::DeadlineExceeded {
                schema: schema.to_string(),
            }),
        }
    }

    /// Sleep for `delay`, cut short by deadline or cancellation.
    pub async fn sleep(&self, schema: &str, delay: Duration) -> Result<()> {
        self.guard(schema, tokio::time::sleep(delay)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_config_merges_ambient() {
        let schema = Schema::builder("Instances", "describeInstances")
            .namespace("EC2", json!({"region": "eu-west-1", "apiVersion": "2016-11-15"}))
            .build()
            .unwrap();
        let ctx = RequestContext::new().with_ambient(json!({
            "region": "us-east-1",
            "credentials": {"accessKeyId": "AKIA"}
        }));

        let client = ctx.client_config(&schema);
        assert_eq!(client.namespace, "EC2");
        assert_eq!(
            client.args,
            json!({
                "region": "eu-west-1",
                "apiVersion": "2016-11-15",
                "credentials": {"accessKeyId": "AKIA"}
            })
        );
        // ambient untouched
        assert_eq!(ctx.ambient()["region"], "us-east-1");
    }

    #[tokio::test]
    async fn test_guard_passes_through() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
        let value = ctx.guard("s", async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_guard_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .guard("Slow", tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(CollectorError::DeadlineExceeded { schema }) if schema == "Slow"));
    }

    #[tokio::test]
    async fn test_guard_cancelled() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        ctx.cancel();

        let result = clone.sleep("s", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(CollectorError::Cancelled { .. })));
    }
}
