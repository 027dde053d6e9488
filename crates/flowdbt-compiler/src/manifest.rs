//! Dependency manifest handed to the engine alongside the artifacts
//!
//! Records the execution order the core computed, so the engine never has to
//! recover it from literal table names inside the SQL.

use serde::{Deserialize, Serialize};

use flowdbt_graph::{DependencyGraph, VertexKind};

use crate::compiler::CompiledModel;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: String,

    /// Upstream references as declared, in slot order
    pub upstream: Vec<String>,

    /// Upstream references that are models rather than data sources
    pub depends_on: Vec<String>,

    /// Artifact file name relative to the output directory
    pub artifact: String,

    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub version: u32,

    /// Data sources the graph reads
    pub sources: Vec<String>,

    /// Models in execution order
    pub models: Vec<ManifestEntry>,
}

impl DependencyManifest {
    /// `models` must already be in topological order
    pub fn new<'a, I>(models: I, graph: &DependencyGraph) -> Self
    where
        I: IntoIterator<Item = &'a CompiledModel>,
    {
        let sources = graph
            .topological_order()
            .iter()
            .filter(|v| graph.kind(v) == Some(VertexKind::Source))
            .cloned()
            .collect();

        let models = models
            .into_iter()
            .map(|model| ManifestEntry {
                name: model.name().to_string(),
                node_type: model.node().node_type.to_string(),
                upstream: model.node().upstream.clone(),
                depends_on: graph
                    .parents(model.name())
                    .into_iter()
                    .filter(|p| graph.kind(p) == Some(VertexKind::Model))
                    .cloned()
                    .collect(),
                artifact: model.file_name(),
                checksum: model.checksum(),
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            sources,
            models,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn execution_order(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }
}
