//! Project driver
//!
//! A [`Project`] owns the declared nodes and everything derived from them.
//! Every compile pass starts from the declared nodes and replaces the
//! previous plan wholesale; nothing from an earlier pass is merged in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use flowdbt_compiler::{ArtifactWriter, ModelCompiler, ResolverRegistry, TemplateStore, WriteSummary};
use flowdbt_core::{
    BuildReport, Config, ConfigurationError, Diagnostic, DiagnosticCode, FlowError, FlowResult,
    InvocationStrategy, Stage,
};
use flowdbt_engine::{EngineSession, ResultInspector, ResultMode, ResultSet};
use flowdbt_graph::{DataSourceCatalog, DependencyGraph, GraphValidator, NodeSpec, Selector};

use crate::error::{ProjectError, ProjectResult};
use crate::plan::ProjectPlan;

pub struct Project {
    config: Config,
    nodes: Vec<NodeSpec>,
    catalog: DataSourceCatalog,
    compiler: ModelCompiler,
    plan: Option<ProjectPlan>,
}

impl Project {
    pub fn new(
        config: Config,
        nodes: Vec<NodeSpec>,
        catalog: DataSourceCatalog,
        compiler: ModelCompiler,
    ) -> Self {
        Self {
            config,
            nodes,
            catalog,
            compiler,
            plan: None,
        }
    }

    /// Read nodes, sources and templates from the locations `config` names
    pub fn load(config: Config) -> ProjectResult<Self> {
        let nodes = NodeSpec::load_all(&config.nodes_path())?;
        let catalog = DataSourceCatalog::from_config(&config)?;

        let templates = match config.templates_path() {
            Some(dir) => TemplateStore::with_dir(&dir)?,
            None => TemplateStore::builtin(),
        };
        let compiler = ModelCompiler::new(ResolverRegistry::new(), templates);

        tracing::info!(
            nodes = nodes.len(),
            sources = catalog.len(),
            path = %config.nodes_path().display(),
            "loaded project"
        );

        Ok(Self::new(config, nodes, catalog, compiler))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn catalog(&self) -> &DataSourceCatalog {
        &self.catalog
    }

    pub fn compiler(&self) -> &ModelCompiler {
        &self.compiler
    }

    /// Plan from the last successful compile pass
    pub fn plan(&self) -> Option<&ProjectPlan> {
        self.plan.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    pub fn writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(self.config.output_path(), self.config.dependency_manifest_path())
            .prune_stale(self.config.prune_stale)
    }

    /// Run a full compile pass
    ///
    /// Order of checks: node types and names, then references and cycles,
    /// then templates and settings. A cyclic graph is rejected before any
    /// template is looked at. On failure no plan is kept.
    pub fn compile(&mut self) -> FlowResult<&ProjectPlan> {
        self.plan = None;

        let validated = GraphValidator::new(self.compiler.registry()).validate(self.nodes.clone())?;
        let graph = DependencyGraph::build(validated.iter(), &self.catalog)?;

        let mut by_name: HashMap<String, NodeSpec> =
            validated.into_iter().map(|n| (n.name.clone(), n)).collect();
        let ordered: Vec<Arc<NodeSpec>> = graph
            .models_in_order()
            .into_iter()
            .filter_map(|name| by_name.remove(name.as_str()))
            .map(Arc::new)
            .collect();

        let models = self.compiler.compile_all(&ordered)?;
        let plan = ProjectPlan::new(graph, models);

        tracing::info!(models = plan.len(), "compile pass succeeded");
        Ok(self.plan.insert(plan))
    }

    /// Compile, then write every artifact and the dependency manifest
    pub fn write_artifacts(&mut self) -> FlowResult<WriteSummary> {
        let writer = self.writer();
        let plan = self.compile()?;
        Ok(writer.write(plan.models(), plan.manifest())?)
    }

    pub async fn seed(&self, session: &EngineSession) -> FlowResult<String> {
        Ok(session.seed().await?)
    }

    /// Compile, write and execute, optionally restricted by `selector`
    ///
    /// Returns the models handed to the engine.
    pub async fn run(
        &mut self,
        session: &EngineSession,
        selector: Option<&Selector>,
    ) -> FlowResult<Vec<String>> {
        let writer = self.writer();
        let invocation = self.config.engine.invocation;
        let clean_after_run = self.config.engine.clean_after_run;

        let plan = self.compile()?;
        writer.write(plan.models(), plan.manifest())?;
        let executed = execute_plan(plan, session, invocation, selector).await?;

        if clean_after_run {
            session.clean().await?;
        }

        Ok(executed)
    }

    /// seed, compile, write, run and (optionally) clean; each stage gates the next
    pub async fn build(&mut self, session: &EngineSession, selector: Option<&Selector>) -> BuildReport {
        let mut report = BuildReport::new();

        let seeded = session.seed().await.map_err(FlowError::from);
        if record(&mut report, Stage::Seed, seeded, |_| Vec::new()).is_none() {
            return report;
        }

        let compiled = self
            .compile()
            .map(|plan| plan.order().into_iter().map(String::from).collect::<Vec<_>>());
        if record(&mut report, Stage::Compile, compiled, Clone::clone).is_none() {
            return report;
        }

        let Some(plan) = self.plan.as_ref() else {
            return report;
        };

        let written = self
            .writer()
            .write(plan.models(), plan.manifest())
            .map_err(FlowError::from);
        let written_models = |_: &WriteSummary| plan.order().into_iter().map(String::from).collect();
        let Some(summary) = record(&mut report, Stage::Write, written, written_models) else {
            return report;
        };
        for path in &summary.pruned {
            report.add_diagnostic(Diagnostic::info(
                DiagnosticCode::ArtifactPruned,
                format!("Removed stale model file {}", path.display()),
            ));
        }

        if let (InvocationStrategy::Delegated, Some(selector)) = (self.config.engine.invocation, selector) {
            report.add_diagnostic(
                Diagnostic::warn(
                    DiagnosticCode::EngineSelectorDelegated,
                    format!("Selector '{selector}' is expanded by the engine, not from the declared graph"),
                )
                .with_node(selector.node.clone()),
            );
        }

        let executed = execute_plan(plan, session, self.config.engine.invocation, selector).await;
        if record(&mut report, Stage::Run, executed, Clone::clone).is_none() {
            return report;
        }

        if self.config.engine.clean_after_run {
            let cleaned = session.clean().await.map_err(FlowError::from);
            record(&mut report, Stage::Clean, cleaned, |_| Vec::new());
        }

        tracing::info!(stages = report.stages.len(), errors = report.summary.errors, "build finished");
        report
    }

    /// Remove every managed artifact, then ask the engine to clean up after itself
    pub async fn full_clean(&mut self, session: &EngineSession) -> FlowResult<Vec<PathBuf>> {
        let removed = self.writer().purge()?;
        self.plan = None;
        session.clean().await?;
        Ok(removed)
    }

    /// Materialized rows of one declared node
    ///
    /// Must not overlap with a run or clean against the same store.
    pub async fn inspect(
        &self,
        inspector: &dyn ResultInspector,
        node: &str,
        mode: ResultMode,
    ) -> ProjectResult<ResultSet> {
        if !self.contains(node) {
            return Err(ProjectError::Flow(
                ConfigurationError::UnknownNode(node.to_string()).into(),
            ));
        }

        Ok(inspector.get_result(node, mode).await?)
    }
}

/// Hand the plan to the engine
///
/// `Ordered` issues one call per model in topological order and stops at the
/// first failure. `Delegated` issues one call with the selector string.
async fn execute_plan(
    plan: &ProjectPlan,
    session: &EngineSession,
    strategy: InvocationStrategy,
    selector: Option<&Selector>,
) -> FlowResult<Vec<String>> {
    let (targets, selector_arg) = match selector {
        Some(selector) => {
            let selection = plan.select(selector)?;
            (selection.models, Some(selection.selector))
        }
        None => (plan.order().into_iter().map(String::from).collect(), None),
    };

    match strategy {
        InvocationStrategy::Ordered => {
            for model in &targets {
                tracing::info!(model = %model, "executing model");
                session.execute(Some(model)).await?;
            }
        }
        InvocationStrategy::Delegated => {
            if let Some(selector) = &selector_arg {
                tracing::warn!(
                    %selector,
                    "model files name relations directly, so the engine cannot expand ancestors or descendants"
                );
            }
            tracing::info!(selector = ?selector_arg, models = targets.len(), "executing selection");
            session.execute(selector_arg.as_deref()).await?;
        }
    }

    Ok(targets)
}

/// Record a stage outcome; `None` means the build stops here
fn record<T>(
    report: &mut BuildReport,
    stage: Stage,
    result: FlowResult<T>,
    models: impl FnOnce(&T) -> Vec<String>,
) -> Option<T> {
    match result {
        Ok(value) => {
            report.record_success(stage, models(&value));
            Some(value)
        }
        Err(e) => {
            tracing::error!(%stage, error = %e, "stage failed");
            report.record_failure(stage, e.to_diagnostic());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdbt_graph::BuiltinType;
    use pretty_assertions::assert_eq;

    fn project(dir: &std::path::Path, nodes: Vec<NodeSpec>) -> Project {
        let mut config = Config::default();
        config.project_root = dir.to_path_buf();
        config.output_dir = PathBuf::from("models");

        Project::new(
            config,
            nodes,
            DataSourceCatalog::from_names(["raw"]),
            ModelCompiler::with_defaults(),
        )
    }

    #[test]
    fn compile_replaces_previous_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project(
            dir.path(),
            vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["raw"])],
        );

        project.compile().unwrap();
        assert_eq!(project.plan().unwrap().order(), vec!["a"]);

        project.nodes = vec![NodeSpec::new("b", BuiltinType::Select).with_upstream(["raw"])];
        project.compile().unwrap();

        let plan = project.plan().unwrap();
        assert_eq!(plan.order(), vec!["b"]);
        assert!(plan.model("a").is_none());
    }

    #[test]
    fn failed_compile_discards_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project(
            dir.path(),
            vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["raw"])],
        );
        project.compile().unwrap();

        project.nodes.push(NodeSpec::new("b", BuiltinType::Filter).with_upstream(["a"]));
        assert!(project.compile().is_err());
        assert!(project.plan().is_none());
    }

    #[test]
    fn nodes_compile_in_topological_order_regardless_of_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project(
            dir.path(),
            vec![
                NodeSpec::new("c", BuiltinType::Select).with_upstream(["b"]),
                NodeSpec::new("b", BuiltinType::Select).with_upstream(["raw"]),
            ],
        );

        let plan = project.compile().unwrap();
        assert_eq!(plan.order(), vec!["b", "c"]);
    }

    #[test]
    fn contains_checks_declared_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(
            dir.path(),
            vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["raw"])],
        );
        assert!(project.contains("a"));
        assert!(!project.contains("raw"));
    }
}
