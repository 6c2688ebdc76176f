//! Public entry point.

use crate::config::CollectorConfig;
use crate::engine::{DependencyPlan, DependencyResolver, PaginatingFetcher, ParallelExecutor, RequestContext};
use crate::remote::RemoteCall;
use crate::schema::{Schema, SchemaRegistry};
use crate::telemetry::{record_stage_metrics, request_span};
use crate::types::params::deep_merge;
use crate::types::{ParamBag, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Collects records for registered schemas.
///
/// Owns the schema registry and the Remote Call boundary; each call to
/// [`lookup_records`](Self::lookup_records) is an independent top-level
/// request with its own [`RequestContext`].
///
/// # Example
///
/// ```rust,ignore
/// let collector = Collector::new(registry, Arc::new(HttpRemote::new("http://localhost:8080")));
///
/// let mut params = ParamBag::new();
/// params.insert("region".into(), json!("us-east-1"));
/// let instances = collector.lookup_records("Instances", params).await?;
/// ```
#[derive(Clone)]
pub struct Collector {
    registry: Arc<SchemaRegistry>,
    resolver: DependencyResolver,
    config: CollectorConfig,
}

impl Collector {
    /// Create collector with default configuration.
    pub fn new(registry: SchemaRegistry, remote: Arc<dyn RemoteCall>) -> Self {
        Self::with_config(registry, remote, CollectorConfig::default())
    }

    /// Create collector with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `registry` - Every schema a request or default source may name
    /// * `remote` - Remote Call boundary
    /// * `config` - Retry, deadline and ambient-key settings
    pub fn with_config(registry: SchemaRegistry, remote: Arc<dyn RemoteCall>, config: CollectorConfig) -> Self {
        let registry = Arc::new(registry);
        let fetcher = PaginatingFetcher::new(remote, config.retry_policy());
        let resolver = DependencyResolver::new(Arc::clone(&registry), ParallelExecutor::new(fetcher));

        Self {
            registry,
            resolver,
            config,
        }
    }

    /// Registered schemas.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect records for a registered schema.
    ///
    /// # Arguments
    ///
    /// * `schema` - Registered schema name
    /// * `params` - Caller parameters; the ambient key, if present, becomes
    ///   the request's ambient client configuration
    ///
    /// # Returns
    ///
    /// Merged records, sorted if the schema declares a sort key
    ///
    /// # Errors
    ///
    /// Any `CollectorError`; there are no partial results
    pub async fn lookup_records(&self, schema: &str, params: ParamBag) -> Result<Vec<Value>> {
        self.lookup_records_with(schema, params, RequestContext::new()).await
    }

    /// Collect records for a registered schema under an explicit context.
    ///
    /// Use this to supply a cancellation token, a deadline or ambient
    /// configuration directly.
    pub async fn lookup_records_with(
        &self,
        schema: &str,
        params: ParamBag,
        ctx: RequestContext,
    ) -> Result<Vec<Value>> {
        let schema = self.registry.get(schema)?;
        self.lookup_schema(schema, params, ctx).await
    }

    /// Collect records for `schema`, which need not be registered.
    ///
    /// Default sources are still looked up in the registry.
    ///
    /// # Errors
    ///
    /// - `CyclicDependency`, `UnresolvableParameter`, `UnknownSchema` before any remote call
    /// - Any error from resolution or execution
    pub async fn lookup_schema(
        &self,
        schema: Arc<Schema>,
        mut params: ParamBag,
        ctx: RequestContext,
    ) -> Result<Vec<Value>> {
        let mut ctx = ctx;
        if let Some(ambient) = params.remove(&self.config.ambient_key) {
            let mut merged = ctx.ambient().clone();
            deep_merge(&mut merged, &ambient);
            ctx = ctx.with_ambient(merged);
        }
        if ctx.deadline().is_none() {
            if let Some(timeout) = self.config.deadline() {
                ctx = ctx.with_timeout(timeout);
            }
        }

        let span = request_span(&schema.name, &ctx.request_id());

        async move {
            let plan = DependencyPlan::build(&self.registry, &schema, &params)?;
            debug!(schema = %schema.name, nodes = plan.len(), depth = plan.depth(), "Dependency plan validated");

            let mut records = match self.resolver.resolve(Arc::clone(&schema), params, &ctx).await {
                Ok(records) => records,
                Err(e) => {
                    record_stage_metrics(None, None, "failed");
                    warn!(schema = %schema.name, error = %e, "Collection failed");
                    return Err(e);
                }
            };

            if let Some(sort_by) = &schema.value.sort_by {
                sort_by.sort(&mut records);
            }

            record_stage_metrics(Some(records.len()), None, "success");
            info!(schema = %schema.name, records = records.len(), "Collection complete");
            Ok(records)
        }
        .instrument(span)
        .await
    }
}
