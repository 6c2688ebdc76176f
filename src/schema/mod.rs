//! Declarative request schemas.
//!
//! A [`Schema`] describes one kind of remote request: which parameters it
//! needs, where missing ones come from, how to page through results and how
//! to merge them. Behaviour that varies per schema is carried as explicit
//! function-valued fields with fixed signatures.
//!
//! # Example
//!
//! ```
//! use record_collector::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::builder("Accounts", "listAccounts")
//!     .namespace("Organizations", json!({}))
//!     .value_path("Accounts")
//!     .sort_by_field("Id")
//!     .cursor_pagination("NextToken", "NextToken")
//!     .build()
//!     .unwrap();
//!
//! assert!(schema.required_params.is_empty());
//! ```

pub mod registry;
pub mod document;

pub use registry::SchemaRegistry;
pub use document::{SchemaDocument, SchemaSpec};

use crate::remote::RemoteError;
use crate::types::params::{is_truthy, lookup_path};
use crate::types::{CollectorError, ParamBag, ParamSet, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a parameter value means "fan out over these".
pub type DetectArrayFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Builds the next page's parameters from the previous parameters and response.
pub type NextParamsFn = Arc<dyn Fn(&ParamSet, &Value) -> ParamSet + Send + Sync>;

/// Combines accumulated records with a new page's records.
pub type MergeFn = Arc<dyn Fn(Vec<Value>, Vec<Value>) -> Vec<Value> + Send + Sync>;

/// Combines the per-ParamSet collections (in ParamSet order) into one.
pub type MergeIndividualFn = Arc<dyn Fn(Vec<Vec<Value>>) -> Vec<Value> + Send + Sync>;

/// Last chance to recover or reclassify a failed page.
pub type OnErrorFn = Arc<dyn Fn(RemoteError) -> ErrorOutcome + Send + Sync>;

/// Extracts the record collection from a response.
pub type ExtractFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Computes a sort key for a record.
pub type SortKeyFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Result of a schema's error hook.
#[derive(Debug, Clone)]
pub enum ErrorOutcome {
    /// Treat the error as fatal (possibly reclassified)
    Fail(RemoteError),
    /// Continue as if the call had returned this response
    Recover(Value),
    /// Treat the failed call as an empty, final page
    Empty,
}

/// Where the record collection lives in a response.
#[derive(Clone)]
pub enum ExtractPath {
    /// Dotted lookup path (e.g. `Reservations`, `Page.Items`)
    Path(String),
    /// Custom extraction function
    Function(ExtractFn),
}

impl ExtractPath {
    fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.clone(),
            Self::Function(_) => "<function>".to_string(),
        }
    }
}

/// Final ordering applied to the collected records.
#[derive(Clone)]
pub enum SortBy {
    /// Sort by the value at a dotted path in each record
    Field(String),
    /// Sort by a computed key
    Key(SortKeyFn),
}

impl SortBy {
    /// Stable sort of `records`, ascending by key.
    ///
    /// Records whose key is missing or `null` keep their relative order and
    /// sort after every record with a key.
    pub fn sort(&self, records: &mut [Value]) {
        match self {
            Self::Field(path) => records.sort_by(|a, b| {
                compare_sort_keys(
                    lookup_path(a, path).unwrap_or(&Value::Null),
                    lookup_path(b, path).unwrap_or(&Value::Null),
                )
            }),
            Self::Key(key) => records.sort_by_cached_key(|record| SortKey(key(record))),
        }
    }
}

/// Order of two sort keys: [`compare_values`], except that `null` sorts last.
fn compare_sort_keys(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(a, b),
    }
}

/// Sort key with a total order for `sort_by_cached_key`.
struct SortKey(Value);

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        compare_sort_keys(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_sort_keys(&self.0, &other.0)
    }
}

/// Total order over JSON values.
///
/// Numbers compare numerically and strings lexically. Values of different
/// kinds order as null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// How to extract and order records.
#[derive(Clone)]
pub struct ValueSpec {
    /// Extraction path or function
    pub path: ExtractPath,

    /// Optional final sort
    pub sort_by: Option<SortBy>,
}

/// Client construction info, passed through to the Remote Call boundary.
#[derive(Debug, Clone)]
pub struct NamespaceDetails {
    /// Service namespace name
    pub name: String,

    /// Constructor arguments; win over ambient configuration on conflict
    pub constructor_args: Value,
}

/// Where to fetch a missing parameter's value from.
#[derive(Debug, Clone)]
pub struct DefaultSource {
    /// Name of the registered schema to collect
    pub schema: String,

    /// Parameters for that collection
    pub params: ParamBag,
}

/// Description of one required parameter.
#[derive(Clone)]
pub struct ParamDescriptor {
    /// Batch-size ceiling
    pub max: usize,

    /// Fan-out predicate (default: value is a JSON array)
    pub detect_array: Option<DetectArrayFn>,

    /// Dependency source used when the caller did not supply the value
    pub default_source: Option<DefaultSource>,
}

impl ParamDescriptor {
    /// Descriptor with the given batch ceiling and default fan-out detection.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            detect_array: None,
            default_source: None,
        }
    }

    /// Use a custom fan-out predicate.
    pub fn detect_array(mut self, detect: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.detect_array = Some(Arc::new(detect));
        self
    }

    /// Resolve from `schema` with `params` when absent.
    pub fn default_source(mut self, schema: impl Into<String>, params: ParamBag) -> Self {
        self.default_source = Some(DefaultSource {
            schema: schema.into(),
            params,
        });
        self
    }

    /// Whether `value` is already array-shaped, i.e. one value per call.
    pub fn is_array(&self, value: &Value) -> bool {
        match &self.detect_array {
            Some(detect) => detect(value),
            None => is_array(value),
        }
    }
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("max", &self.max)
            .field("custom_detect_array", &self.detect_array.is_some())
            .field("default_source", &self.default_source)
            .finish()
    }
}

/// Default fan-out predicate: the value is a JSON array.
pub fn is_array(value: &Value) -> bool {
    value.is_array()
}

/// Fan-out predicate for parameters whose single value is itself a list:
/// only an array of arrays fans out.
pub fn is_nested_array(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .map_or(false, Value::is_array)
}

/// Default page merge: concatenation.
pub fn concat(mut acc: Vec<Value>, page: Vec<Value>) -> Vec<Value> {
    acc.extend(page);
    acc
}

/// Default ParamSet merge: flatten in ParamSet order.
pub fn flatten(sets: Vec<Vec<Value>>) -> Vec<Value> {
    sets.into_iter().flatten().collect()
}

/// Declarative description of one kind of remote request.
///
/// Immutable once built; shared as `Arc<Schema>` through a [`SchemaRegistry`].
#[derive(Clone)]
pub struct Schema {
    /// Identifier used in diagnostics and dependency sources
    pub name: String,

    /// Required parameters in declaration order
    pub required_params: Vec<(String, ParamDescriptor)>,

    /// Defaults merged into every call
    pub params: ParamBag,

    /// Remote method to invoke
    pub api_method: String,

    /// Client construction info
    pub namespace: NamespaceDetails,

    /// Record extraction and final ordering
    pub value: ValueSpec,

    /// Response path whose truthiness means "more pages remain"
    pub incomplete_indicator: Option<String>,

    /// Next-page parameter constructor
    pub next_batch: Option<NextParamsFn>,

    /// Error hook
    pub on_error: Option<OnErrorFn>,

    /// Page merge (default: concat)
    pub merge_operator: Option<MergeFn>,

    /// ParamSet merge (default: flatten)
    pub merge_individual: Option<MergeIndividualFn>,
}

impl Schema {
    /// Start building a schema.
    ///
    /// # Arguments
    ///
    /// * `name` - Schema name
    /// * `api_method` - Remote method invoked for each page
    pub fn builder(name: impl Into<String>, api_method: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name.into(), api_method.into())
    }

    /// Descriptor for a required parameter, if declared.
    pub fn required(&self, name: &str) -> Option<&ParamDescriptor> {
        self.required_params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, descriptor)| descriptor)
    }

    /// Every required parameter is present in `params`, by key.
    ///
    /// A key with a `null` or empty value still counts as present.
    pub fn sufficient_params(&self, params: &ParamBag) -> bool {
        self.required_params
            .iter()
            .all(|(name, _)| params.contains_key(name))
    }

    /// Extract one page's records.
    ///
    /// A missing or falsy value (`null`, `false`, `0`, `""`) yields `None`.
    /// An array, even an empty one, yields its elements; any other value is
    /// a single record.
    pub fn extract(&self, response: &Value) -> Option<Vec<Value>> {
        let found = match &self.value.path {
            ExtractPath::Path(path) => lookup_path(response, path).cloned(),
            ExtractPath::Function(extract) => extract(response),
        }?;

        match found {
            Value::Array(items) => Some(items),
            other if is_truthy(&other) => Some(vec![other]),
            _ => None,
        }
    }

    /// Build the extraction error for `response`.
    pub(crate) fn extraction_error(&self, response: &Value) -> CollectorError {
        CollectorError::Extraction {
            schema: self.name.clone(),
            path: self.value.path.describe(),
            response: response.to_string(),
        }
    }

    /// Whether `response` says more pages remain.
    pub fn is_incomplete(&self, response: &Value) -> bool {
        self.incomplete_indicator
            .as_deref()
            .and_then(|path| lookup_path(response, path))
            .map_or(false, is_truthy)
    }

    /// Parameters for the page after `response`.
    pub fn next_params(&self, current: &ParamSet, response: &Value) -> ParamSet {
        match &self.next_batch {
            Some(next) => next(current, response),
            None => current.clone(),
        }
    }

    /// Merge a page into the accumulator.
    pub fn merge_pages(&self, acc: Vec<Value>, page: Vec<Value>) -> Vec<Value> {
        match &self.merge_operator {
            Some(merge) => merge(acc, page),
            None => concat(acc, page),
        }
    }

    /// Merge per-ParamSet collections.
    pub fn merge_sets(&self, sets: Vec<Vec<Value>>) -> Vec<Value> {
        match &self.merge_individual {
            Some(merge) => merge(sets),
            None => flatten(sets),
        }
    }

    /// Run the error hook, or fail with the error unchanged.
    pub fn recover(&self, err: RemoteError) -> ErrorOutcome {
        match &self.on_error {
            Some(hook) => hook(err),
            None => ErrorOutcome::Fail(err),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("api_method", &self.api_method)
            .field("namespace", &self.namespace)
            .field("required_params", &self.required_params)
            .field("params", &self.params)
            .field("incomplete_indicator", &self.incomplete_indicator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    fn new(name: String, api_method: String) -> Self {
        Self {
            schema: Schema {
                name,
                required_params: Vec::new(),
                params: ParamBag::new(),
                api_method,
                namespace: NamespaceDetails {
                    name: String::new(),
                    constructor_args: Value::Object(Default::default()),
                },
                value: ValueSpec {
                    path: ExtractPath::Path(String::new()),
                    sort_by: None,
                },
                incomplete_indicator: None,
                next_batch: None,
                on_error: None,
                merge_operator: None,
                merge_individual: None,
            },
        }
    }

    /// Client namespace and constructor arguments.
    pub fn namespace(mut self, name: impl Into<String>, constructor_args: Value) -> Self {
        self.schema.namespace = NamespaceDetails {
            name: name.into(),
            constructor_args,
        };
        self
    }

    /// Declare a required parameter. Declaration order is preserved.
    pub fn required_param(mut self, name: impl Into<String>, descriptor: ParamDescriptor) -> Self {
        self.schema.required_params.push((name.into(), descriptor));
        self
    }

    /// Default parameter value merged into every call.
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.schema.params.insert(name.into(), value);
        self
    }

    /// Extract records from a dotted path.
    pub fn value_path(mut self, path: impl Into<String>) -> Self {
        self.schema.value.path = ExtractPath::Path(path.into());
        self
    }

    /// Extract records with a function.
    pub fn value_fn(mut self, extract: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.schema.value.path = ExtractPath::Function(Arc::new(extract));
        self
    }

    /// Sort final output by the value at a dotted path.
    pub fn sort_by_field(mut self, path: impl Into<String>) -> Self {
        self.schema.value.sort_by = Some(SortBy::Field(path.into()));
        self
    }

    /// Sort final output by a computed key.
    pub fn sort_by_key(mut self, key: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.schema.value.sort_by = Some(SortBy::Key(Arc::new(key)));
        self
    }

    /// Paginate while `indicator` is truthy, building next params with `next`.
    pub fn paginate(
        mut self,
        indicator: impl Into<String>,
        next: impl Fn(&ParamSet, &Value) -> ParamSet + Send + Sync + 'static,
    ) -> Self {
        self.schema.incomplete_indicator = Some(indicator.into());
        self.schema.next_batch = Some(Arc::new(next));
        self
    }

    /// Cursor pagination: copy `response_field` into the `param` of the next call.
    ///
    /// The response field doubles as the incomplete indicator.
    pub fn cursor_pagination(self, response_field: impl Into<String>, param: impl Into<String>) -> Self {
        let response_field = response_field.into();
        let param = param.into();
        let source = response_field.clone();
        self.paginate(response_field, move |current, response| {
            let mut next = current.clone();
            if let Some(cursor) = lookup_path(response, &source) {
                next.insert(param.clone(), cursor.clone());
            }
            next
        })
    }

    /// Error hook.
    pub fn on_error(mut self, hook: impl Fn(RemoteError) -> ErrorOutcome + Send + Sync + 'static) -> Self {
        self.schema.on_error = Some(Arc::new(hook));
        self
    }

    /// Page merge operator.
    pub fn merge_operator(
        mut self,
        merge: impl Fn(Vec<Value>, Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.schema.merge_operator = Some(Arc::new(merge));
        self
    }

    /// ParamSet merge operator.
    pub fn merge_individual(
        mut self,
        merge: impl Fn(Vec<Vec<Value>>) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.schema.merge_individual = Some(Arc::new(merge));
        self
    }

    /// Finish the schema.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if the schema has no name, no
    /// method, or declares a parameter twice
    pub fn build(self) -> Result<Schema> {
        let schema = self.schema;

        if schema.name.is_empty() {
            return Err(CollectorError::config("Schema name must not be empty"));
        }
        if schema.api_method.is_empty() {
            return Err(CollectorError::config(format!(
                "Schema {} has no api method",
                schema.name
            )));
        }
        for (i, (name, _)) in schema.required_params.iter().enumerate() {
            if schema.required_params[..i].iter().any(|(other, _)| other == name) {
                return Err(CollectorError::config(format!(
                    "Schema {} declares required parameter {} twice",
                    schema.name, name
                )));
            }
        }

        Ok(schema)
    }
}
