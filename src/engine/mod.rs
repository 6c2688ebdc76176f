//! Collection engine.
//!
//! # Pipeline
//!
//! ```text
//! DependencyPlan ──> DependencyResolver ──> ParallelExecutor ──> PaginatingFetcher ──> RemoteCall
//!   (cycle check)      (default sources)      (ParamSet fan-out)     (pages + retry)
//! ```
//!
//! Every stage takes a [`RequestContext`] carrying the ambient client
//! configuration, the deadline and the cancellation token.

pub mod context;
pub mod executor;
pub mod fetcher;
pub mod graph;
pub mod param_set;
pub mod resolver;
pub mod retry;

pub use context::RequestContext;
pub use executor::ParallelExecutor;
pub use fetcher::PaginatingFetcher;
pub use graph::{DependencyPlan, PlanNode};
pub use param_set::build_param_sets;
pub use resolver::DependencyResolver;
pub use retry::RetryPolicy;
