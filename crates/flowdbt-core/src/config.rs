//! Configuration schema (flowdbt.toml)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How execution order is communicated to the external engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStrategy {
    /// One engine call per model, in topological order
    Ordered,

    /// One engine call with a selector; the engine infers order itself
    ///
    /// Compiled models reference their inputs by relation name, not through
    /// `ref()`, so the engine sees no edges between them. A `+x+` selector
    /// then matches only `x` on the engine side.
    Delegated,
}

impl Default for InvocationStrategy {
    fn default() -> Self {
        Self::Ordered
    }
}

/// Declared data sources usable as leaf upstream references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Explicit source names
    #[serde(default)]
    pub names: Vec<String>,

    /// Directory of seed files; every file stem is a source
    #[serde(default)]
    pub seeds_dir: Option<PathBuf>,
}

/// External engine (dbt) invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine executable
    #[serde(default = "default_engine_executable")]
    pub executable: String,

    /// Engine project directory
    #[serde(default = "default_engine_project_dir")]
    pub project_dir: PathBuf,

    /// Directory holding profiles.yml
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,

    /// Upper bound for a single engine call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ordering strategy for `run`
    #[serde(default)]
    pub invocation: InvocationStrategy,

    /// Call `clean` after a run
    #[serde(default)]
    pub clean_after_run: bool,

    /// Variables passed to every engine call (`--vars`)
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

fn default_engine_executable() -> String {
    "dbt".to_string()
}

fn default_engine_project_dir() -> PathBuf {
    PathBuf::from("dbt_project")
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    900
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: default_engine_executable(),
            project_dir: default_engine_project_dir(),
            profiles_dir: default_profiles_dir(),
            timeout_secs: default_timeout_secs(),
            invocation: InvocationStrategy::default(),
            clean_after_run: false,
            vars: BTreeMap::new(),
        }
    }
}

/// Result inspection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectConfig {
    #[serde(default = "default_inspect_executable")]
    pub executable: String,

    /// Backing store the engine writes to
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Rows returned in preview mode
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_inspect_executable() -> String {
    "duckdb".to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("flowdbt.duckdb")
}

fn default_preview_rows() -> usize {
    20
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            executable: default_inspect_executable(),
            database: default_database(),
            preview_rows: default_preview_rows(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node declaration file (json or toml)
    #[serde(default = "default_nodes")]
    pub nodes: PathBuf,

    /// Where compiled artifacts are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Optional directory of `<type>.sql` template overrides
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Remove artifacts for nodes no longer in the graph
    #[serde(default = "default_true")]
    pub prune_stale: bool,

    /// Dependency manifest location (defaults to inside `output_dir`)
    #[serde(default)]
    pub dependency_manifest: Option<PathBuf>,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub inspect: InspectConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_nodes() -> PathBuf {
    PathBuf::from("nodes.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dbt_project/models/flowdbt")
}

fn default_true() -> bool {
    true
}

/// File name of the dependency manifest when not configured explicitly
pub const DEPENDENCY_MANIFEST_NAME: &str = "_flowdbt_dependencies.json";

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            output_dir: default_output_dir(),
            templates_dir: None,
            prune_stale: true,
            dependency_manifest: None,
            sources: SourcesConfig::default(),
            engine: EngineConfig::default(),
            inspect: InspectConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.resolve(&self.nodes)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn templates_path(&self) -> Option<PathBuf> {
        self.templates_dir.as_deref().map(|p| self.resolve(p))
    }

    pub fn dependency_manifest_path(&self) -> PathBuf {
        match &self.dependency_manifest {
            Some(path) => self.resolve(path),
            None => self.output_path().join(DEPENDENCY_MANIFEST_NAME),
        }
    }

    pub fn seeds_path(&self) -> Option<PathBuf> {
        self.sources.seeds_dir.as_deref().map(|p| self.resolve(p))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.prune_stale);
        assert_eq!(config.engine.executable, "dbt");
        assert_eq!(config.engine.invocation, InvocationStrategy::Ordered);
        assert_eq!(config.inspect.preview_rows, 20);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            output_dir = "models/generated"
            prune_stale = false

            [sources]
            names = ["data", "customers"]

            [engine]
            invocation = "delegated"
            vars = { flowdbt_duckdb_path = "warehouse.duckdb" }
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("models/generated"));
        assert!(!config.prune_stale);
        assert_eq!(config.sources.names, vec!["data", "customers"]);
        assert_eq!(config.engine.invocation, InvocationStrategy::Delegated);
        assert_eq!(config.engine.executable, "dbt");
        assert_eq!(config.engine.timeout_secs, 900);
        assert_eq!(
            config.engine.vars.get("flowdbt_duckdb_path").map(String::as_str),
            Some("warehouse.duckdb")
        );
    }

    #[test]
    fn paths_resolve_against_project_root() {
        let mut config = Config::default();
        config.project_root = PathBuf::from("/srv/flow");

        assert_eq!(config.output_path(), PathBuf::from("/srv/flow/dbt_project/models/flowdbt"));
        assert_eq!(
            config.dependency_manifest_path(),
            PathBuf::from("/srv/flow/dbt_project/models/flowdbt").join(DEPENDENCY_MANIFEST_NAME)
        );

        config.output_dir = PathBuf::from("/abs/out");
        assert_eq!(config.output_path(), PathBuf::from("/abs/out"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.engine, parsed.engine);
        assert_eq!(config.output_dir, parsed.output_dir);
    }
}
