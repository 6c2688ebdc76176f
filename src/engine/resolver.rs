//! Recursive dependency resolution.
//!
//! A request whose required parameters are all present goes straight to the
//! [`ParallelExecutor`]. Otherwise every missing parameter is collected from
//! its default source (concurrently, each through this same resolver), the
//! resulting records are layered onto the parameter bag under the parameter
//! name, and resolution starts over.
//!
//! The resolver assumes the graph is acyclic; [`DependencyPlan`] checks that
//! before the first call.
//!
//! [`DependencyPlan`]: crate::engine::graph::DependencyPlan

use crate::engine::context::RequestContext;
use crate::engine::executor::ParallelExecutor;
use crate::schema::{Schema, SchemaRegistry};
use crate::telemetry::{record_stage_metrics, stage_span, RequestStage};
use crate::types::{CollectorError, ParamBag, Result};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Resolves missing parameters from their default sources, then executes.
#[derive(Clone)]
pub struct DependencyResolver {
    registry: Arc<SchemaRegistry>,
    executor: ParallelExecutor,
}

impl DependencyResolver {
    /// Create resolver.
    ///
    /// # Arguments
    ///
    /// * `registry` - Schemas that default sources refer to
    /// * `executor` - Executor used once a request is self-sufficient
    pub fn new(registry: Arc<SchemaRegistry>, executor: ParallelExecutor) -> Self {
        Self { registry, executor }
    }

    /// Registry used to look up default sources.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Resolve `schema` with `params` and return its records.
    ///
    /// # Arguments
    ///
    /// * `schema` - Schema to collect
    /// * `params` - Caller parameters; present values are never overwritten
    /// * `ctx` - Request context shared by every nested resolution
    ///
    /// # Errors
    ///
    /// - `UnresolvableParameter` if a missing parameter has no default source
    /// - `UnknownSchema` if a default source is not registered
    /// - Any error from a nested resolution or from execution
    pub fn resolve<'a>(
        &'a self,
        schema: Arc<Schema>,
        params: ParamBag,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Vec<Value>>> {
        let span = stage_span(RequestStage::Resolve, &schema.name);

        async move {
            let mut params = params;
            let mut round = 0u32;

            loop {
                let mut pending = Vec::new();
                for (name, descriptor) in &schema.required_params {
                    if params.contains_key(name) {
                        continue;
                    }
                    let source = descriptor.default_source.as_ref().ok_or_else(|| {
                        CollectorError::UnresolvableParameter {
                            schema: schema.name.clone(),
                            param: name.clone(),
                        }
                    })?;
                    let dependency = self.registry.get(&source.schema)?;
                    pending.push((name.clone(), dependency, source.params.clone()));
                }

                if pending.is_empty() {
                    let records = self.executor.execute(&schema, &params, ctx).await?;
                    record_stage_metrics(Some(records.len()), None, "success");
                    return Ok(records);
                }

                round += 1;
                debug!(
                    schema = %schema.name,
                    round,
                    missing = ?pending.iter().map(|(name, _, _)| name.as_str()).collect::<Vec<_>>(),
                    "Resolving missing parameters"
                );

                let resolved = try_join_all(pending.into_iter().map(|(name, dependency, source_params)| async move {
                    let records = self.resolve(dependency, source_params, ctx).await?;
                    Ok::<_, CollectorError>((name, records))
                }))
                .await?;

                for (name, records) in resolved {
                    params.insert(name, Value::Array(records));
                }
            }
        }
        .instrument(span)
        .boxed()
    }
}
