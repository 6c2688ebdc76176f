//! Parameter-set construction with batch splitting.
//!
//! Turns one logical request into the concrete parameter objects for each
//! remote call:
//!
//! ```text
//! required: region (scalar), accountId (array of 2), InstanceIds (250 ids, max 100)
//!
//! accountId   = ["111", "222"]          -> fans out to 2 sets
//! InstanceIds = [i-1 .. i-250], max 100 -> split into 3 chunks -> 3 != 2 -> ParameterAlignment
//! ```
//!
//! Fan-out parameters must agree in cardinality; scalars are copied into
//! every set. The builder never invents values: resolution happens first.

use crate::schema::Schema;
use crate::types::params::canonical;
use crate::types::{CollectorError, ParamBag, ParamSet, Result};
use serde_json::Value;

/// Split `items` into contiguous chunks of at most `max` elements.
///
/// A `max` of zero is treated as one.
pub fn chunk(items: &[Value], max: usize) -> Vec<Value> {
    items
        .chunks(max.max(1))
        .map(|chunk| Value::Array(chunk.to_vec()))
        .collect()
}

/// Build the parameter sets for one request.
///
/// # Arguments
///
/// * `schema` - Schema being executed
/// * `params` - Caller parameters, with every required parameter present
///
/// # Returns
///
/// One parameter set per remote call, in fan-out order. Every set starts
/// from the schema defaults overlaid with `params`.
///
/// # Errors
///
/// - `MissingParameter` if a required parameter is absent
/// - `ParameterAlignment` if two fan-out parameters disagree in length
/// - `InvalidParameter` if a descriptor calls a non-array value array-shaped
/// - `EmptyFanOut` if a fan-out parameter has no values
pub fn build_param_sets(schema: &Schema, params: &ParamBag) -> Result<Vec<ParamSet>> {
    let mut base = schema.params.clone();
    base.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut sets: Vec<ParamSet> = Vec::new();
    let mut scalars: Vec<(&str, &Value)> = Vec::new();

    for (name, descriptor) in &schema.required_params {
        let value = params
            .get(name)
            .ok_or_else(|| CollectorError::MissingParameter {
                schema: schema.name.clone(),
                param: name.clone(),
                params: canonical(params),
            })?;

        let array_shaped = descriptor.is_array(value);
        let oversized = !array_shaped && value.as_array().map_or(false, |a| a.len() > descriptor.max);

        if !array_shaped && !oversized {
            scalars.push((name.as_str(), value));
            continue;
        }

        let items = value
            .as_array()
            .ok_or_else(|| CollectorError::InvalidParameter {
                schema: schema.name.clone(),
                param: name.clone(),
                reason: format!("fan-out requires a sequence, got {}", value),
            })?;

        let values = if oversized {
            chunk(items, descriptor.max)
        } else {
            items.clone()
        };

        if values.is_empty() {
            return Err(CollectorError::EmptyFanOut {
                schema: schema.name.clone(),
                param: name.clone(),
            });
        }

        if sets.is_empty() {
            sets = vec![base.clone(); values.len()];
        } else if sets.len() != values.len() {
            return Err(CollectorError::ParameterAlignment {
                schema: schema.name.clone(),
                param: name.clone(),
                expected: sets.len(),
                found: values.len(),
            });
        }

        for (set, value) in sets.iter_mut().zip(values) {
            set.insert(name.clone(), value);
        }
    }

    if sets.is_empty() {
        sets.push(base);
    }

    for (name, value) in scalars {
        for set in sets.iter_mut() {
            set.insert(name.to_string(), value.clone());
        }
    }

    Ok(sets)
}
