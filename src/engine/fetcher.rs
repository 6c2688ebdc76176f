//! Pagination loop for a single ParamSet.
//!
//! ```text
//! Calling ──ok──> extract ──> merge ──incomplete?──yes──> next params ──> Calling
//!    │                                      └──no──> Done
//!    └─err─> retry (bounded, jittered) ──exhausted──> on_error ──> Fail | Recover | Empty
//! ```
//!
//! Pages within one ParamSet are strictly sequential: each request is built
//! from the previous response. A failure at page K discards pages 0..K-1.

use crate::engine::context::RequestContext;
use crate::engine::retry::RetryPolicy;
use crate::remote::{ClientConfig, RemoteCall};
use crate::schema::{ErrorOutcome, Schema};
use crate::telemetry::{record_stage_metrics, stage_span, RequestStage};
use crate::types::params::canonical;
use crate::types::{CollectorError, ParamSet, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Fetches every page for one ParamSet.
#[derive(Clone)]
pub struct PaginatingFetcher {
    remote: Arc<dyn RemoteCall>,
    retry: RetryPolicy,
}

impl PaginatingFetcher {
    /// Create fetcher.
    ///
    /// # Arguments
    ///
    /// * `remote` - Remote Call boundary
    /// * `retry` - Retry policy applied to each page
    pub fn new(remote: Arc<dyn RemoteCall>, retry: RetryPolicy) -> Self {
        Self { remote, retry }
    }

    /// Retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch and merge all pages for `params`.
    ///
    /// # Arguments
    ///
    /// * `schema` - Schema being executed
    /// * `params` - Fully materialized parameters for the first page
    /// * `ctx` - Request context (ambient config, deadline, cancellation)
    ///
    /// # Returns
    ///
    /// Records from every page, merged with the schema's merge operator in page order
    ///
    /// # Errors
    ///
    /// - `Extraction` if a response has nothing at the value path
    /// - `RetriesExhausted` / `RemoteCall` if a page fails and the error hook does not recover it
    /// - `DeadlineExceeded` / `Cancelled` from the context
    pub async fn fetch(
        &self,
        schema: &Schema,
        params: ParamSet,
        ctx: &RequestContext,
    ) -> Result<Vec<Value>> {
        let span = stage_span(RequestStage::Fetch, &schema.name);

        async move {
            let client = ctx.client_config(schema);
            let mut current = params;
            let mut records = Vec::new();
            let mut pages = 0usize;

            loop {
                let response = match self
                    .fetch_page(schema, &client, &current, ctx)
                    .instrument(stage_span(RequestStage::Page, &schema.name))
                    .await
                {
                    Ok(Some(response)) => response,
                    Ok(None) => {
                        debug!(schema = %schema.name, pages, "Error hook ended pagination with an empty page");
                        break;
                    }
                    Err(e) => {
                        record_stage_metrics(None, Some(pages), "failed");
                        return Err(e);
                    }
                };
                pages += 1;

                let page = match schema.extract(&response) {
                    Some(page) => page,
                    None => {
                        record_stage_metrics(None, Some(pages), "failed");
                        return Err(schema.extraction_error(&response));
                    }
                };
                records = schema.merge_pages(records, page);

                if !schema.is_incomplete(&response) {
                    break;
                }
                current = schema.next_params(&current, &response);
                debug!(schema = %schema.name, page = pages, "Fetching next page");
            }

            record_stage_metrics(Some(records.len()), Some(pages), "success");
            Ok(records)
        }
        .instrument(span)
        .await
    }

    /// One page, with retries and the error hook applied.
    ///
    /// `Ok(None)` means the error hook turned the failure into an empty final page.
    async fn fetch_page(
        &self,
        schema: &Schema,
        client: &ClientConfig,
        params: &ParamSet,
        ctx: &RequestContext,
    ) -> Result<Option<Value>> {
        let body = Value::Object(params.clone());
        let mut attempt = 0u32;

        let err = loop {
            attempt += 1;
            let call = self.remote.invoke(client, &schema.api_method, &body);

            match ctx.guard(&schema.name, call).await? {
                Ok(response) => return Ok(Some(response)),
                Err(err) if err.retryable && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        schema = %schema.name,
                        method = %schema.api_method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Remote call failed, retrying"
                    );
                    ctx.sleep(&schema.name, delay).await?;
                }
                Err(err) => break err,
            }
        };

        let retryable = err.retryable;
        match schema.recover(err) {
            ErrorOutcome::Recover(response) => Ok(Some(response)),
            ErrorOutcome::Empty => Ok(None),
            ErrorOutcome::Fail(source) if retryable => Err(CollectorError::RetriesExhausted {
                schema: schema.name.clone(),
                method: schema.api_method.clone(),
                params: canonical(params),
                attempts: attempt,
                source,
            }),
            ErrorOutcome::Fail(source) => Err(CollectorError::RemoteCall {
                schema: schema.name.clone(),
                method: schema.api_method.clone(),
                params: canonical(params),
                source,
            }),
        }
    }
}
