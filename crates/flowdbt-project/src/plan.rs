//! Project plan: the compiled models of one pass, ordered and addressable

use std::collections::HashMap;

use flowdbt_compiler::{CompiledModel, DependencyManifest};
use flowdbt_core::ConfigurationError;
use flowdbt_graph::{DependencyGraph, NodeId, Selector, VertexKind};

/// A selector expanded against the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Opaque selector string handed to the engine
    pub selector: String,

    /// Every selected vertex, data sources included, in topological order
    pub nodes: Vec<NodeId>,

    /// Selected models only, in topological order
    pub models: Vec<NodeId>,
}

/// Output of one compile pass
///
/// Models are held in topological order. A plan is never updated in place:
/// the next compile pass builds a new one.
#[derive(Debug)]
pub struct ProjectPlan {
    graph: DependencyGraph,
    models: Vec<CompiledModel>,
    index: HashMap<String, usize>,
    manifest: DependencyManifest,
}

impl ProjectPlan {
    /// `models` may arrive in any order; they are sorted by the graph
    pub fn new(graph: DependencyGraph, models: Vec<CompiledModel>) -> Self {
        let mut by_name: HashMap<String, CompiledModel> = models
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();

        let models: Vec<CompiledModel> = graph
            .models_in_order()
            .into_iter()
            .filter_map(|name| by_name.remove(name.as_str()))
            .collect();

        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name().to_string(), i))
            .collect();

        let manifest = DependencyManifest::new(&models, &graph);

        Self {
            graph,
            models,
            index,
            manifest,
        }
    }

    /// Compiled model for a node identity
    pub fn model(&self, name: &str) -> Option<&CompiledModel> {
        self.index.get(name).map(|&i| &self.models[i])
    }

    /// Every compiled model, producers before consumers
    pub fn models(&self) -> &[CompiledModel] {
        &self.models
    }

    /// Model identities in execution order
    pub fn order(&self) -> Vec<&str> {
        self.models.iter().map(CompiledModel::name).collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn manifest(&self) -> &DependencyManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Expand a selector into the vertices it covers
    pub fn select(&self, selector: &Selector) -> Result<Selection, ConfigurationError> {
        let nodes = selector.expand(&self.graph)?;
        let models = nodes
            .iter()
            .filter(|n| self.graph.kind(n) == Some(VertexKind::Model))
            .cloned()
            .collect();

        Ok(Selection {
            selector: selector.to_string(),
            nodes,
            models,
        })
    }
}
