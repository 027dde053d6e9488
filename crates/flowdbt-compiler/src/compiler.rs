//! Model compilation
//!
//! Renders a node's template with the parameters its resolver produced.

use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior};
use sha2::{Digest, Sha256};

use flowdbt_core::{FlowResult, TemplateNotFoundError, TemplateRenderError};
use flowdbt_graph::NodeSpec;

use crate::resolver::{ResolverRegistry, TemplateParams};
use crate::templates::TemplateStore;

/// The rendered artifact for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModel {
    node: Arc<NodeSpec>,
    params: TemplateParams,
    sql: String,
}

impl CompiledModel {
    pub fn node(&self) -> &NodeSpec {
        &self.node
    }

    /// Node identity
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn params(&self) -> &TemplateParams {
        &self.params
    }

    /// Rendered text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Identifier the engine materializes the model as
    pub fn output_name(&self) -> &str {
        &self.node.name
    }

    pub fn file_name(&self) -> String {
        format!("{}.sql", self.output_name())
    }

    /// Hex sha256 of the rendered text
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.sql.as_bytes()))
    }
}

/// Template renderer over a resolver registry and template store
pub struct ModelCompiler {
    env: Environment<'static>,
    registry: ResolverRegistry,
    templates: TemplateStore,
}

impl ModelCompiler {
    pub fn new(registry: ResolverRegistry, templates: TemplateStore) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        Self {
            env,
            registry,
            templates,
        }
    }

    /// Built-in resolvers and templates only
    pub fn with_defaults() -> Self {
        Self::new(ResolverRegistry::new(), TemplateStore::builtin())
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Compile one node
    pub fn compile(&self, node: &Arc<NodeSpec>) -> FlowResult<CompiledModel> {
        let body = self
            .templates
            .get(node.node_type.name())
            .ok_or_else(|| TemplateNotFoundError {
                node: node.name.clone(),
                node_type: node.node_type.to_string(),
            })?;

        let params = self.registry.resolve(node)?;

        let sql = self
            .env
            .render_str(body, &params)
            .map_err(|e| TemplateRenderError {
                node: node.name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(node = %node.name, node_type = %node.node_type, "compiled model");

        Ok(CompiledModel {
            node: Arc::clone(node),
            params,
            sql,
        })
    }

    /// Compile every node or none: the first failure aborts the pass
    pub fn compile_all(&self, nodes: &[Arc<NodeSpec>]) -> FlowResult<Vec<CompiledModel>> {
        let models = nodes
            .iter()
            .map(|node| self.compile(node))
            .collect::<FlowResult<Vec<_>>>()?;

        tracing::info!(models = models.len(), "compile pass finished");
        Ok(models)
    }
}

impl Default for ModelCompiler {
    fn default() -> Self {
        Self::with_defaults()
    }
}
