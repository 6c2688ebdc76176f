//! Tracing instrumentation for collection stages.
//!
//! # Span conventions
//!
//! Every stage span is named `collector.stage` at INFO level with:
//! - `otel.name`: `{stage} {schema}` (e.g. `fetch Instances`)
//! - `otel.kind`: always `"internal"`
//! - `collector.stage`, `collector.schema`
//! - `collector.records`, `collector.pages`, `collector.status`: recorded when the stage ends
//!
//! # Example
//!
//! ```rust,ignore
//! use record_collector::telemetry::{stage_span, record_stage_metrics, RequestStage};
//!
//! let span = stage_span(RequestStage::Execute, "Instances");
//! let _guard = span.entered();
//! record_stage_metrics(Some(42), None, "success");
//! ```

use tracing::{field, span, Level, Span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Collection stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    /// Dependency resolution for one schema and parameter bag
    Resolve,
    /// Fan-out over ParamSets
    Execute,
    /// Pagination loop for one ParamSet
    Fetch,
    /// One remote call, retries included
    Page,
}

impl RequestStage {
    /// Get stage as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Execute => "execute",
            Self::Fetch => "fetch",
            Self::Page => "page",
        }
    }
}

/// Create stage span.
///
/// # Arguments
///
/// * `stage` - Collection stage
/// * `schema` - Schema name
///
/// # Returns
///
/// Tracing span with stage attributes and empty metric fields
pub fn stage_span(stage: RequestStage, schema: &str) -> Span {
    span!(
        Level::INFO,
        "collector.stage",
        otel.name = format!("{} {}", stage.as_str(), schema),
        otel.kind = "internal",
        collector.stage = stage.as_str(),
        collector.schema = schema,
        collector.records = field::Empty,
        collector.pages = field::Empty,
        collector.status = field::Empty,
    )
}

/// Create the root span for one top-level request.
///
/// # Arguments
///
/// * `schema` - Requested schema name
/// * `request_id` - Request identifier from the context
pub fn request_span(schema: &str, request_id: &Uuid) -> Span {
    span!(
        Level::INFO,
        "collector.request",
        otel.name = format!("collect {}", schema),
        otel.kind = "internal",
        collector.schema = schema,
        request_id = %request_id,
        collector.records = field::Empty,
        collector.pages = field::Empty,
        collector.status = field::Empty,
    )
}

/// Record stage metrics on the current span.
///
/// # Arguments
///
/// * `records` - Records produced (optional)
/// * `pages` - Pages fetched (optional)
/// * `status` - Stage status ("success", "failed", "recovered")
pub fn record_stage_metrics(records: Option<usize>, pages: Option<usize>, status: &str) {
    let span = Span::current();
    if let Some(records) = records {
        span.record("collector.records", records);
    }
    if let Some(pages) = pages {
        span.record("collector.pages", pages);
    }
    span.record("collector.status", status);
}

/// Install a global `fmt` subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. Does nothing if a subscriber
/// is already installed.
///
/// # Arguments
///
/// * `json` - Emit JSON lines instead of human-readable output
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
