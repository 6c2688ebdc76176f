//! Schema registry.
//!
//! Dependency sources refer to schemas by name; the registry turns those
//! names back into schemas. Schemas are read-only once registered.

use crate::schema::Schema;
use crate::types::{CollectorError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Name → schema lookup.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Create empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its name.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ConfigError` if the name is already taken
    pub fn register(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        if self.schemas.contains_key(&schema.name) {
            return Err(CollectorError::config(format!(
                "Schema {} is already registered",
                schema.name
            )));
        }

        let schema = Arc::new(schema);
        self.schemas.insert(schema.name.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Get schema by name.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::UnknownSchema` if not registered
    pub fn get(&self, name: &str) -> Result<Arc<Schema>> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| CollectorError::UnknownSchema(name.to_string()))
    }

    /// Check if a schema is registered.
    pub fn has(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schema names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
