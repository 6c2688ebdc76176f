//! Concurrent fan-out over ParamSets.

use crate::engine::context::RequestContext;
use crate::engine::fetcher::PaginatingFetcher;
use crate::engine::param_set::build_param_sets;
use crate::schema::Schema;
use crate::telemetry::{record_stage_metrics, stage_span, RequestStage};
use crate::types::{ParamBag, Result};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, Instrument};

/// Runs one fetcher per ParamSet concurrently and merges the results.
///
/// Fan-out width equals the number of ParamSets. The merged output follows
/// ParamSet order, never completion order. The first failure aborts every
/// sibling and discards their results.
#[derive(Clone)]
pub struct ParallelExecutor {
    fetcher: PaginatingFetcher,
}

impl ParallelExecutor {
    /// Create executor around a fetcher.
    pub fn new(fetcher: PaginatingFetcher) -> Self {
        Self { fetcher }
    }

    /// Execute `schema` for a fully resolved parameter bag.
    ///
    /// # Arguments
    ///
    /// * `schema` - Schema to execute
    /// * `params` - Parameters with every required parameter present
    /// * `ctx` - Request context
    ///
    /// # Returns
    ///
    /// Per-ParamSet results merged with the schema's `merge_individual`
    ///
    /// # Errors
    ///
    /// Any ParamSet construction error, or the first fetch failure
    pub async fn execute(
        &self,
        schema: &Schema,
        params: &ParamBag,
        ctx: &RequestContext,
    ) -> Result<Vec<Value>> {
        let span = stage_span(RequestStage::Execute, &schema.name);

        async move {
            let sets = build_param_sets(schema, params)?;
            debug!(schema = %schema.name, param_sets = sets.len(), "Fanning out");

            let results = try_join_all(
                sets.into_iter()
                    .map(|set| self.fetcher.fetch(schema, set, ctx)),
            )
            .await?;

            let records = schema.merge_sets(results);
            record_stage_metrics(Some(records.len()), None, "success");
            Ok(records)
        }
        .instrument(span)
        .await
    }
}
