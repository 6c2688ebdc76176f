//! Static dependency graph and cycle detection.
//!
//! Nodes are `(schema name, canonical params)` pairs; an edge runs from a
//! node to the default source of each required parameter the node is missing.
//! The graph is walked once before any remote call so that cycles and
//! unresolvable parameters fail fast.
//!
//! ```text
//! Instances{region}  --accountId-->  Accounts{}
//! Policies{}         --roleName-->   Roles{}  --policyArn-->  Policies{}   => CyclicDependency
//! ```

use crate::schema::{Schema, SchemaRegistry};
use crate::types::params::canonical;
use crate::types::{CollectorError, ParamBag, Result};
use std::collections::{HashMap, HashSet};

type NodeKey = (String, String);

/// One request in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    /// Schema name
    pub schema: String,

    /// Canonical serialization of the node's parameters
    pub params: String,

    /// Missing parameter name → index of the node that supplies it
    pub depends_on: Vec<(String, usize)>,
}

/// Validated dependency graph for one top-level request.
///
/// Nodes are stored in post-order: every node appears after the nodes it
/// depends on, so the root is always last.
#[derive(Debug, Clone)]
pub struct DependencyPlan {
    nodes: Vec<PlanNode>,
}

impl DependencyPlan {
    /// Walk the dependency graph rooted at `schema` with `params`.
    ///
    /// # Errors
    ///
    /// - `CyclicDependency` if any chain of default sources loops back on itself
    /// - `UnresolvableParameter` if a missing parameter has no default source
    /// - `UnknownSchema` if a default source names an unregistered schema
    pub fn build(registry: &SchemaRegistry, schema: &Schema, params: &ParamBag) -> Result<Self> {
        let mut walk = Walk {
            registry,
            nodes: Vec::new(),
            visited: HashMap::new(),
            path: Vec::new(),
            path_set: HashSet::new(),
        };
        walk.visit(schema, params)?;

        Ok(Self { nodes: walk.nodes })
    }

    /// Nodes in dependency order.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// The requested node.
    pub fn root(&self) -> Option<&PlanNode> {
        self.nodes.last()
    }

    /// Number of distinct requests, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan is empty. Never true for a built plan.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Longest dependency chain below the root, in edges.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            depths[i] = node
                .depends_on
                .iter()
                .map(|(_, dep)| depths[*dep] + 1)
                .max()
                .unwrap_or(0);
        }
        depths.last().copied().unwrap_or(0)
    }
}

struct Walk<'a> {
    registry: &'a SchemaRegistry,
    nodes: Vec<PlanNode>,
    visited: HashMap<NodeKey, usize>,
    path: Vec<NodeKey>,
    path_set: HashSet<NodeKey>,
}

impl Walk<'_> {
    fn visit(&mut self, schema: &Schema, params: &ParamBag) -> Result<usize> {
        let key: NodeKey = (schema.name.clone(), canonical(params));

        if self.path_set.contains(&key) {
            let start = self.path.iter().position(|k| *k == key).unwrap_or(0);
            let mut path: Vec<String> = self.path[start..].iter().map(|(name, _)| name.clone()).collect();
            path.push(schema.name.clone());
            return Err(CollectorError::CyclicDependency { path });
        }

        if let Some(&index) = self.visited.get(&key) {
            return Ok(index);
        }

        self.path.push(key.clone());
        self.path_set.insert(key.clone());

        let mut depends_on = Vec::new();
        for (param, descriptor) in &schema.required_params {
            if params.contains_key(param) {
                continue;
            }

            let source = descriptor
                .default_source
                .as_ref()
                .ok_or_else(|| CollectorError::UnresolvableParameter {
                    schema: schema.name.clone(),
                    param: param.clone(),
                })?;
            let dependency = self.registry.get(&source.schema)?;
            let index = self.visit(&dependency, &source.params)?;
            depends_on.push((param.clone(), index));
        }

        self.path.pop();
        self.path_set.remove(&key);

        let index = self.nodes.len();
        self.nodes.push(PlanNode {
            schema: key.0.clone(),
            params: key.1.clone(),
            depends_on,
        });
        self.visited.insert(key, index);
        Ok(index)
    }
}
