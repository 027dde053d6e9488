//! dbt command-line adapter
//!
//! Drives `dbt seed`, `dbt run` and `dbt clean` as child processes. Output is
//! captured and passed through as the outcome's diagnostics. Children are
//! spawned with `kill_on_drop`, so a timed-out or cancelled call does not
//! leave a dbt process running.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use flowdbt_core::{Config, EngineError};
use tokio::process::Command;

use crate::adapter::{EngineAdapter, EngineOperation, EngineOutcome};

/// File that marks a directory as a dbt project
pub const DBT_PROJECT_FILE: &str = "dbt_project.yml";

#[derive(Debug, Clone)]
pub struct DbtCliAdapter {
    executable: String,
    project_dir: PathBuf,
    profiles_dir: PathBuf,
    vars: BTreeMap<String, String>,
    opened: bool,
}

impl DbtCliAdapter {
    pub fn new(
        executable: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        profiles_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            project_dir: project_dir.into(),
            profiles_dir: profiles_dir.into(),
            vars: BTreeMap::new(),
            opened: false,
        }
    }

    /// Build from the `[engine]` section, resolving paths against the project root
    pub fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        let mut adapter = Self::new(
            engine.executable.clone(),
            config.resolve(&engine.project_dir),
            config.resolve(&engine.profiles_dir),
        );
        adapter.vars = engine.vars.clone();
        adapter
    }

    /// Override the executable (e.g., from `FLOWDBT_DBT`)
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Arguments for one dbt invocation
    pub fn command_args(&self, operation: EngineOperation, selector: Option<&str>) -> Vec<String> {
        let mut args = vec![
            operation.as_str().to_string(),
            "--project-dir".to_string(),
            self.project_dir.display().to_string(),
            "--profiles-dir".to_string(),
            self.profiles_dir.display().to_string(),
        ];

        // `clean` takes no vars or selection
        if operation != EngineOperation::Clean {
            if !self.vars.is_empty() {
                args.push("--vars".to_string());
                args.push(serde_json::to_string(&self.vars).unwrap_or_default());
            }
            if let Some(selector) = selector {
                args.push("--select".to_string());
                args.push(selector.to_string());
            }
        }

        args
    }

    async fn invoke(
        &self,
        operation: EngineOperation,
        selector: Option<&str>,
    ) -> Result<EngineOutcome, EngineError> {
        if !self.opened {
            return Err(EngineError::NotOpen(self.name().to_string()));
        }

        let args = self.command_args(operation, selector);
        tracing::info!(executable = %self.executable, args = ?args, "invoking dbt");

        let output = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Spawn(format!("{}: {}", self.executable, e)))?;

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&stderr);
        }

        tracing::debug!(%operation, status = ?output.status.code(), "dbt exited");

        Ok(EngineOutcome {
            success: output.status.success(),
            diagnostics,
        })
    }
}

#[async_trait::async_trait]
impl EngineAdapter for DbtCliAdapter {
    fn name(&self) -> &'static str {
        "dbt"
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        let marker = self.project_dir.join(DBT_PROJECT_FILE);
        if !marker.is_file() {
            return Err(EngineError::Spawn(format!(
                "no {} in {}",
                DBT_PROJECT_FILE,
                self.project_dir.display()
            )));
        }

        self.opened = true;
        Ok(())
    }

    async fn load_base_data(&self) -> Result<EngineOutcome, EngineError> {
        self.invoke(EngineOperation::Seed, None).await
    }

    async fn execute(&self, selector: Option<&str>) -> Result<EngineOutcome, EngineError> {
        self.invoke(EngineOperation::Run, selector).await
    }

    async fn clean(&self) -> Result<EngineOutcome, EngineError> {
        self.invoke(EngineOperation::Clean, None).await
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.opened = false;
        Ok(())
    }
}
