//! Artifact emission
//!
//! One `<name>.sql` per model in the output directory. Every file is written
//! to a temporary sibling and renamed into place, so readers only ever see a
//! complete artifact or the previous one.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use flowdbt_core::ArtifactError;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::compiler::CompiledModel;
use crate::manifest::DependencyManifest;

const ARTIFACT_EXTENSION: &str = "sql";

/// What a write pass changed on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    manifest_path: PathBuf,
    prune_stale: bool,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            manifest_path: manifest_path.into(),
            prune_stale: true,
        }
    }

    /// Keep artifacts of nodes that left the graph when `false`
    pub fn prune_stale(mut self, prune: bool) -> Self {
        self.prune_stale = prune;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn artifact_path(&self, model: &CompiledModel) -> PathBuf {
        self.output_dir.join(model.file_name())
    }

    /// Write every artifact and the manifest, then prune stale artifacts
    pub fn write(
        &self,
        models: &[CompiledModel],
        manifest: &DependencyManifest,
    ) -> Result<WriteSummary, ArtifactError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ArtifactError {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut summary = WriteSummary::default();

        for model in models {
            let path = self.artifact_path(model);
            write_atomic(&path, model.sql().as_bytes())?;
            tracing::debug!(node = model.name(), path = %path.display(), "wrote artifact");
            summary.written.push(path);
        }

        let json = manifest.to_json().map_err(|e| ArtifactError {
            path: self.manifest_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ArtifactError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomic(&self.manifest_path, json.as_bytes())?;
        summary.manifest = Some(self.manifest_path.clone());

        if self.prune_stale {
            let keep: HashSet<PathBuf> = summary.written.iter().cloned().collect();
            summary.pruned = self.remove_artifacts(|path| !keep.contains(path))?;
        }

        tracing::info!(
            written = summary.written.len(),
            pruned = summary.pruned.len(),
            dir = %self.output_dir.display(),
            "artifacts written"
        );

        Ok(summary)
    }

    /// Remove every managed artifact and the manifest
    pub fn purge(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        if !self.output_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut removed = self.remove_artifacts(|_| true)?;

        if self.manifest_path.is_file() {
            std::fs::remove_file(&self.manifest_path).map_err(|source| ArtifactError {
                path: self.manifest_path.clone(),
                source,
            })?;
            removed.push(self.manifest_path.clone());
        }

        tracing::info!(removed = removed.len(), "purged artifacts");
        Ok(removed)
    }

    /// Current artifacts in the output directory, sorted by path
    pub fn existing_artifacts(&self) -> Result<Vec<PathBuf>, ArtifactError> {
        let mut found = Vec::new();

        for entry in WalkDir::new(&self.output_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ArtifactError {
                path: self.output_dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?;

            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION)
            {
                found.push(path.to_path_buf());
            }
        }

        found.sort();
        Ok(found)
    }

    fn remove_artifacts<F>(&self, should_remove: F) -> Result<Vec<PathBuf>, ArtifactError>
    where
        F: Fn(&PathBuf) -> bool,
    {
        let mut removed = Vec::new();

        for path in self.existing_artifacts()? {
            if should_remove(&path) {
                std::fs::remove_file(&path).map_err(|source| ArtifactError {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "removed artifact");
                removed.push(path);
            }
        }

        Ok(removed)
    }
}

/// Write to a temp file in the target directory, then rename over `path`
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ArtifactError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let to_err = |source| ArtifactError {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(to_err)?;
    tmp.write_all(contents).map_err(to_err)?;
    tmp.as_file().sync_all().map_err(to_err)?;
    tmp.persist(path).map_err(|e| to_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ModelCompiler;
    use flowdbt_graph::{BuiltinType, DataSourceCatalog, DependencyGraph, NodeSpec};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn compile(nodes: Vec<NodeSpec>) -> (Vec<CompiledModel>, DependencyManifest) {
        let nodes: Vec<Arc<NodeSpec>> = nodes.into_iter().map(Arc::new).collect();
        let graph = DependencyGraph::build(
            nodes.iter().map(|n| n.as_ref()),
            &DataSourceCatalog::from_names(["data"]),
        )
        .unwrap();
        let models = ModelCompiler::with_defaults().compile_all(&nodes).unwrap();
        let manifest = DependencyManifest::new(&models, &graph);
        (models, manifest)
    }

    fn writer(dir: &Path) -> ArtifactWriter {
        ArtifactWriter::new(dir.join("models"), dir.join("models/_deps.json"))
    }

    #[test]
    fn writes_one_file_per_model_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (models, manifest) = compile(vec![
            NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"]),
            NodeSpec::new("b", BuiltinType::Filter)
                .with_upstream(["a"])
                .with_setting("predicate", "x > 1"),
        ]);

        let summary = writer(dir.path()).write(&models, &manifest).unwrap();

        assert_eq!(summary.written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("models/b.sql")).unwrap(),
            "select *\nfrom a\nwhere x > 1\n"
        );

        let written: DependencyManifest =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("models/_deps.json")).unwrap())
                .unwrap();
        assert_eq!(written.execution_order().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(written.sources, vec!["data"]);
        assert_eq!(written.models[1].depends_on, vec!["a"]);
        assert!(written.models[0].depends_on.is_empty());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("models"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| !n.ends_with(".sql") && !n.ends_with(".json"))
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind: {leftovers:?}");
    }

    #[test]
    fn stale_artifacts_are_pruned_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("models");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("removed_node.sql"), "select 1").unwrap();
        std::fs::write(out.join("notes.txt"), "keep me").unwrap();

        let (models, manifest) = compile(vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"])]);
        let summary = writer(dir.path()).write(&models, &manifest).unwrap();

        assert_eq!(summary.pruned, vec![out.join("removed_node.sql")]);
        assert!(!out.join("removed_node.sql").exists());
        assert!(out.join("notes.txt").exists());
    }

    #[test]
    fn stale_artifacts_survive_when_pruning_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("models");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("removed_node.sql"), "select 1").unwrap();

        let (models, manifest) = compile(vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"])]);
        let summary = writer(dir.path())
            .prune_stale(false)
            .write(&models, &manifest)
            .unwrap();

        assert!(summary.pruned.is_empty());
        assert!(out.join("removed_node.sql").exists());
    }

    #[test]
    fn rewrite_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        let (models, manifest) = compile(vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"])]);
        w.write(&models, &manifest).unwrap();

        let (models, manifest) = compile(vec![NodeSpec::new("a", BuiltinType::Select)
            .with_upstream(["data"])
            .with_setting("columns", "id")]);
        w.write(&models, &manifest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("models/a.sql")).unwrap(),
            "select id\nfrom data\n"
        );
    }

    #[test]
    fn purge_removes_artifacts_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let (models, manifest) = compile(vec![NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"])]);
        w.write(&models, &manifest).unwrap();

        let removed = w.purge().unwrap();

        assert_eq!(removed.len(), 2);
        assert!(w.existing_artifacts().unwrap().is_empty());
        assert!(!dir.path().join("models/_deps.json").exists());
    }

    #[test]
    fn purge_without_output_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert!(writer(dir.path()).purge().unwrap().is_empty());
    }
}
