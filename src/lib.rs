//! Record Collector - declarative collection of paginated, batch-limited
//! record sets from remote APIs.
//!
//! A caller names a [`Schema`](schema::Schema) and supplies parameters; the
//! engine resolves missing parameters from other schemas, fans out over
//! multi-valued and oversized parameters, pages through every response with
//! bounded retries and returns one merged, optionally sorted collection.
//!
//! # Example
//!
//! ```rust,ignore
//! use record_collector::{Collector, HttpRemote, ParamBag, SchemaDocument};
//! use std::sync::Arc;
//!
//! let registry = SchemaDocument::load("schemas.yaml")?.into_registry()?;
//! let collector = Collector::new(registry, Arc::new(HttpRemote::new("http://localhost:8080")));
//! let accounts = collector.lookup_records("Accounts", ParamBag::new()).await?;
//! ```

pub mod collector;
pub mod config;
pub mod engine;
pub mod remote;
pub mod schema;
pub mod telemetry;
pub mod types;

// Re-export main types
pub use collector::Collector;
pub use config::CollectorConfig;
pub use engine::{DependencyPlan, RequestContext, RetryPolicy};
pub use remote::{ClientConfig, HttpRemote, RemoteCall, RemoteError};
pub use schema::{ErrorOutcome, ParamDescriptor, Schema, SchemaDocument, SchemaRegistry};
pub use types::{CollectorError, ParamBag, ParamSet, Result};
