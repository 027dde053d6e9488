//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency graphs over models and the data
//! sources they read. Construction fails on unresolved references and on
//! cycles, so every `DependencyGraph` value is a valid DAG with a fixed
//! topological order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use flowdbt_core::{ConfigurationError, CyclicGraphError, FlowResult};
use serde::{Deserialize, Serialize};

use crate::catalog::DataSourceCatalog;
use crate::node::NodeSpec;

/// Node identifier (the node or data-source name)
pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    Source,
    Model,
}

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Vertices in declaration order (sources appear just before their first consumer)
    vertices: Vec<NodeId>,

    kinds: HashMap<NodeId, VertexKind>,

    /// Forward edges: node -> distinct nodes it depends on (parents)
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Reverse edges: node -> nodes that depend on it (children)
    children: HashMap<NodeId, Vec<NodeId>>,

    /// Producers before consumers, ties broken by declaration order
    order: Vec<NodeId>,
}

impl DependencyGraph {
    /// Build the graph from validated nodes and the data-source catalog
    pub fn build<'a, I>(nodes: I, catalog: &DataSourceCatalog) -> FlowResult<Self>
    where
        I: IntoIterator<Item = &'a NodeSpec>,
    {
        let nodes: Vec<&NodeSpec> = nodes.into_iter().collect();
        let models: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();

        if let Some(node) = nodes.iter().find(|n| catalog.contains(&n.name)) {
            return Err(ConfigurationError::AmbiguousReference(node.name.clone()).into());
        }

        let mut vertices = Vec::new();
        let mut kinds = HashMap::new();
        let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for node in &nodes {
            let mut deps: Vec<NodeId> = Vec::with_capacity(node.upstream.len());

            for reference in &node.upstream {
                if !models.contains(reference.as_str()) {
                    if !catalog.contains(reference) {
                        return Err(ConfigurationError::UnresolvedReference {
                            node: node.name.clone(),
                            reference: reference.clone(),
                        }
                        .into());
                    }

                    if !kinds.contains_key(reference) {
                        kinds.insert(reference.clone(), VertexKind::Source);
                        vertices.push(reference.clone());
                    }
                }

                // The same input may fill two slots; it is still one edge
                if !deps.contains(reference) {
                    deps.push(reference.clone());
                }
            }

            for dep in &deps {
                children.entry(dep.clone()).or_default().push(node.name.clone());
            }

            kinds.insert(node.name.clone(), VertexKind::Model);
            vertices.push(node.name.clone());
            parents.insert(node.name.clone(), deps);
        }

        let mut graph = Self {
            vertices,
            kinds,
            parents,
            children,
            order: Vec::new(),
        };

        graph.order = graph.topological_sort()?;

        tracing::debug!(
            vertices = graph.vertices.len(),
            order = ?graph.order,
            "built dependency graph"
        );

        Ok(graph)
    }

    /// Kahn's algorithm with a min-heap on declaration index
    fn topological_sort(&self) -> Result<Vec<NodeId>, CyclicGraphError> {
        let index: HashMap<&str, usize> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_str(), i))
            .collect();

        let mut in_degree: Vec<usize> = self
            .vertices
            .iter()
            .map(|v| self.parents.get(v).map_or(0, Vec::len))
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut result = Vec::with_capacity(self.vertices.len());

        while let Some(Reverse(i)) = ready.pop() {
            let node = &self.vertices[i];
            result.push(node.clone());

            for child in self.children.get(node).into_iter().flatten() {
                let c = index[child.as_str()];
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    ready.push(Reverse(c));
                }
            }
        }

        if result.len() == self.vertices.len() {
            Ok(result)
        } else {
            let emitted: HashSet<&NodeId> = result.iter().collect();
            Err(self.find_cycle(&emitted))
        }
    }

    /// Walk parent edges among unsorted vertices until one repeats
    fn find_cycle(&self, emitted: &HashSet<&NodeId>) -> CyclicGraphError {
        let stuck = |v: &&NodeId| !emitted.contains(v);

        // Every stuck vertex has at least one stuck parent, so the walk must loop
        let mut current = self.vertices.iter().find(stuck);
        let mut path: Vec<NodeId> = Vec::new();
        let mut seen: HashMap<&NodeId, usize> = HashMap::new();

        while let Some(node) = current {
            if let Some(&start) = seen.get(node) {
                let mut cycle = path[start..].to_vec();
                cycle.push(node.clone());
                return CyclicGraphError { cycle };
            }

            seen.insert(node, path.len());
            path.push(node.clone());
            current = self.parents.get(node).and_then(|ps| ps.iter().find(stuck));
        }

        CyclicGraphError { cycle: path }
    }

    /// Get all vertices in declaration order
    pub fn all_nodes(&self) -> &[NodeId] {
        &self.vertices
    }

    /// Every vertex, producers before consumers
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Model vertices only, in topological order
    pub fn models_in_order(&self) -> Vec<&NodeId> {
        self.order
            .iter()
            .filter(|v| self.kind(v) == Some(VertexKind::Model))
            .collect()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.kinds.contains_key(node_id)
    }

    pub fn kind(&self, node_id: &str) -> Option<VertexKind> {
        self.kinds.get(node_id).copied()
    }

    /// Get immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Get immediate children (dependents) of a node
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.children
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Get all downstream nodes (transitive closure of children)
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(node_id, &self.children)
    }

    /// Get all upstream nodes (transitive closure of parents)
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(node_id, &self.parents)
    }

    fn closure(node_id: &str, edges: &HashMap<NodeId, Vec<NodeId>>) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = edges.get(node_id) {
            queue.extend(next.iter().cloned());
        }

        // BFS over the chosen edge direction
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(next) = edges.get(&current) {
                queue.extend(next.iter().filter(|n| !visited.contains(*n)).cloned());
            }

            result.push(current);
        }

        result
    }

    /// Restrict `names` to the graph and return them in topological order
    pub fn in_topological_order(&self, names: &HashSet<NodeId>) -> Vec<NodeId> {
        self.order
            .iter()
            .filter(|v| names.contains(*v))
            .cloned()
            .collect()
    }
}
