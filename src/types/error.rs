//! Error types for record collection.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use crate::remote::RemoteError;
use thiserror::Error;

/// Comprehensive error type for all collection operations.
///
/// Every variant raised while executing a request names the schema and,
/// where one exists, the parameters that were being used.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Required parameter absent from the bag handed to the param-set builder
    #[error("Problem creating call params for {schema}: looking for {param}, but did not find it in params {params}")]
    MissingParameter {
        schema: String,
        param: String,
        params: String,
    },

    /// Two fan-out parameters disagree in cardinality
    #[error("Problem constructing params for {schema}: {param} fans out to {found} values but earlier parameters produced {expected}")]
    ParameterAlignment {
        schema: String,
        param: String,
        expected: usize,
        found: usize,
    },

    /// Parameter value cannot be used the way its descriptor demands
    #[error("Invalid value for {param} in schema {schema}: {reason}")]
    InvalidParameter {
        schema: String,
        param: String,
        reason: String,
    },

    /// A fan-out parameter produced no values, so there is nothing to execute
    #[error("Parameter {param} of schema {schema} fans out to zero values; nothing to execute")]
    EmptyFanOut { schema: String, param: String },

    /// Required parameter has neither a literal value nor a dependency source
    #[error("No acceptable value provided for the {param} parameter in the {schema} schema: supply it directly or declare a default source")]
    UnresolvableParameter { schema: String, param: String },

    /// Dependency source names a schema that is not registered
    #[error("Schema not registered: {0}")]
    UnknownSchema(String),

    /// Dependency declarations form a cycle
    #[error("Cyclic dependency between schemas: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// Response has no data at the declared extraction path
    #[error("{schema} specifies path as {path} but that path is not present on {response}")]
    Extraction {
        schema: String,
        path: String,
        response: String,
    },

    /// Retry policy gave up on a transient remote failure
    #[error("Error fetching results for schema {schema} ({method}) with params {params} after {attempts} attempts: {source}")]
    RetriesExhausted {
        schema: String,
        method: String,
        params: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// Non-retryable remote failure that the schema's error hook did not recover
    #[error("Error fetching results for schema {schema} ({method}) with params {params}: {source}")]
    RemoteCall {
        schema: String,
        method: String,
        params: String,
        #[source]
        source: RemoteError,
    },

    /// Request deadline elapsed
    #[error("Deadline exceeded while collecting {schema}")]
    DeadlineExceeded { schema: String },

    /// Request cancelled by the caller
    #[error("Request cancelled while collecting {schema}")]
    Cancelled { schema: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CollectorError {
    /// Create a configuration error with context.
    ///
    /// # Arguments
    ///
    /// * `msg` - Error message
    ///
    /// # Returns
    ///
    /// `CollectorError::ConfigError`
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is recoverable.
    ///
    /// Schema and parameter defects fail the same way every time; only
    /// timing and remote availability problems may clear up on a later run.
    ///
    /// # Returns
    ///
    /// `true` if the top-level request can be retried, `false` otherwise
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RetriesExhausted { .. }
            | Self::DeadlineExceeded { .. }
            | Self::Cancelled { .. }
            | Self::IoError(_) => true,
            Self::RemoteCall { source, .. } => source.retryable,
            _ => false,
        }
    }
}
