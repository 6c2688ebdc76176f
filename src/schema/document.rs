//! Schema documents (YAML/JSON).
//!
//! Lets schemas be authored as pure data. Every strategy a document can
//! express maps to one of a closed set of built-in functions; schemas that
//! need arbitrary logic use [`Schema::builder`](crate::schema::Schema::builder).
//!
//! # Example
//!
//! ```yaml
//! schemas:
//!   - name: AccountIds
//!     api_method: listAccountIds
//!     namespace: { name: Organizations }
//!     value: { path: AccountIds }
//!     pagination:
//!       incomplete_indicator: NextToken
//!       cursor: [{ from: NextToken, to: NextToken }]
//!
//!   - name: Instances
//!     api_method: describeInstances
//!     namespace: { name: EC2 }
//!     value: { path: Reservations }
//!     required_params:
//!       - name: region
//!         max: 1
//!       - name: accountId
//!         max: 1
//!         default_source: { schema: AccountIds }
//! ```

use crate::remote::RemoteError;
use crate::schema::{
    is_array, is_nested_array, ErrorOutcome, ParamDescriptor, Schema, SchemaRegistry,
};
use crate::types::params::lookup_path;
use crate::types::{CollectorError, ParamBag, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A file of schema definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Schemas in the document
    pub schemas: Vec<SchemaSpec>,
}

/// One schema as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Schema name (unique within a registry)
    pub name: String,

    /// Remote method to invoke
    pub api_method: String,

    /// Client namespace
    pub namespace: NamespaceSpec,

    /// Defaults merged into every call
    #[serde(default)]
    pub params: ParamBag,

    /// Record extraction
    pub value: ValueSpecDoc,

    /// Pagination, if the method pages
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,

    /// Required parameters in declaration order
    #[serde(default)]
    pub required_params: Vec<ParamSpec>,

    /// Page merge
    #[serde(default)]
    pub merge: PageMerge,

    /// ParamSet merge
    #[serde(default)]
    pub merge_individual: SetMerge,

    /// Error recovery
    #[serde(default)]
    pub on_error: OnErrorSpec,
}

/// Client namespace and constructor arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceSpec {
    /// Namespace name
    pub name: String,

    /// Constructor arguments
    #[serde(default)]
    pub constructor_args: Option<Value>,
}

/// Extraction path and sort field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSpecDoc {
    /// Dotted path to the records
    pub path: String,

    /// Dotted path of the sort key within each record
    #[serde(default)]
    pub sort_by: Option<String>,
}

/// Cursor-style pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSpec {
    /// Response path that is truthy while more pages remain
    pub incomplete_indicator: String,

    /// Response values copied into the next call's params; at least one
    #[serde(default)]
    pub cursor: Vec<CursorMapping>,
}

/// Copy `from` (response path) into `to` (param name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorMapping {
    pub from: String,
    pub to: String,
}

/// Required parameter as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Batch-size ceiling
    pub max: usize,

    /// Fan-out predicate
    #[serde(default)]
    pub detect_array: DetectArray,

    /// Dependency source
    #[serde(default)]
    pub default_source: Option<DefaultSourceSpec>,
}

/// Dependency source as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSourceSpec {
    /// Source schema name
    pub schema: String,

    /// Params for the source
    #[serde(default)]
    pub params: ParamBag,
}

/// Built-in fan-out predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectArray {
    /// Any JSON array fans out
    #[default]
    Array,
    /// Only an array of arrays fans out; a flat array is one value
    NestedArray,
    /// Never fans out; oversized arrays are still split by `max`
    Never,
}

/// Built-in page merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMerge {
    /// Append each page
    #[default]
    Concat,
    /// Keep only the last page
    Replace,
}

/// Built-in ParamSet merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetMerge {
    /// Concatenate in ParamSet order
    #[default]
    Flatten,
    /// Keep only the first ParamSet's records
    First,
}

/// Built-in error hook. With no codes listed every error is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnErrorSpec {
    /// Errors carrying one of these codes become an empty, final page
    #[serde(default)]
    pub ignore_codes: Vec<String>,
}

impl SchemaSpec {
    /// Convert into an executable schema.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if the schema definition is
    /// incomplete, or if a `pagination` block maps no cursor fields
    pub fn into_schema(self) -> Result<Schema> {
        if let Some(pagination) = &self.pagination {
            if pagination.cursor.is_empty() {
                return Err(CollectorError::config(format!(
                    "Schema {} paginates on {} but maps no cursor fields",
                    self.name, pagination.incomplete_indicator
                )));
            }
        }

        let mut builder = Schema::builder(self.name, self.api_method)
            .namespace(
                self.namespace.name,
                self.namespace
                    .constructor_args
                    .unwrap_or_else(|| Value::Object(Default::default())),
            )
            .value_path(self.value.path);

        if let Some(sort_by) = self.value.sort_by {
            builder = builder.sort_by_field(sort_by);
        }

        for (name, value) in self.params {
            builder = builder.param(name, value);
        }

        if let Some(pagination) = self.pagination {
            let cursor = pagination.cursor;
            builder = builder.paginate(pagination.incomplete_indicator, move |current, response| {
                let mut next = current.clone();
                for mapping in &cursor {
                    match lookup_path(response, &mapping.from) {
                        Some(value) => next.insert(mapping.to.clone(), value.clone()),
                        None => next.remove(&mapping.to),
                    };
                }
                next
            });
        }

        for param in self.required_params {
            let mut descriptor = ParamDescriptor::new(param.max);
            descriptor = match param.detect_array {
                DetectArray::Array => descriptor.detect_array(is_array),
                DetectArray::NestedArray => descriptor.detect_array(is_nested_array),
                DetectArray::Never => descriptor.detect_array(|_| false),
            };
            if let Some(source) = param.default_source {
                descriptor = descriptor.default_source(source.schema, source.params);
            }
            builder = builder.required_param(param.name, descriptor);
        }

        if self.merge == PageMerge::Replace {
            builder = builder.merge_operator(|_, page| page);
        }

        if self.merge_individual == SetMerge::First {
            builder = builder.merge_individual(|sets| sets.into_iter().next().unwrap_or_default());
        }

        if !self.on_error.ignore_codes.is_empty() {
            let codes = self.on_error.ignore_codes;
            builder = builder.on_error(move |err: RemoteError| {
                let ignored = err
                    .code
                    .as_ref()
                    .map_or(false, |code| codes.iter().any(|c| c == code));
                if ignored {
                    ErrorOutcome::Empty
                } else {
                    ErrorOutcome::Fail(err)
                }
            });
        }

        builder.build()
    }
}

impl SchemaDocument {
    /// Parse a YAML document (JSON is valid YAML).
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a document from disk.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if the file cannot be read, or a
    /// parse error if it is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Self::from_yaml(&content),
        }
    }

    /// Build a registry from every schema in the document.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` for invalid or duplicate schemas
    pub fn into_registry(self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for definition in self.schemas {
            registry.register(definition.into_schema()?)?;
        }
        Ok(registry)
    }
}

impl TryFrom<SchemaSpec> for Schema {
    type Error = CollectorError;

    fn try_from(definition: SchemaSpec) -> Result<Self> {
        definition.into_schema()
    }
}
