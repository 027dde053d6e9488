//! Build report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Pipeline stage, in the order a full build runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Seed,
    Compile,
    Write,
    Run,
    Clean,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Seed => "seed",
            Self::Compile => "compile",
            Self::Write => "write",
            Self::Run => "run",
            Self::Clean => "clean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Succeeded,
    Failed,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,

    /// Models the stage touched, in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Number of models compiled
    pub models_compiled: usize,

    /// Number of models handed to the engine
    pub models_executed: usize,
}

/// Build report (build-report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Stages in the order they ran
    pub stages: Vec<StageOutcome>,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            stages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record_success(&mut self, stage: Stage, models: Vec<String>) {
        match stage {
            Stage::Compile => self.summary.models_compiled = models.len(),
            Stage::Run => self.summary.models_executed = models.len(),
            _ => {}
        }

        self.stages.push(StageOutcome {
            stage,
            status: StageStatus::Succeeded,
            models,
        });
    }

    /// Record a failed stage together with the diagnostic explaining it
    pub fn record_failure(&mut self, stage: Stage, diagnostic: Diagnostic) {
        self.stages.push(StageOutcome {
            stage,
            status: StageStatus::Failed,
            models: diagnostic.node.iter().cloned().collect(),
        });
        self.add_diagnostic(diagnostic);
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => self.summary.info += 1,
        }

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// The first stage that failed, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
            .map(|s| s.stage)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for BuildReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, DiagnosticCode};

    #[test]
    fn empty_report() {
        let report = BuildReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
        assert_eq!(report.failed_stage(), None);
    }

    #[test]
    fn failed_stage_is_recorded() {
        let mut report = BuildReport::new();
        report.record_success(Stage::Seed, Vec::new());
        report.record_success(Stage::Compile, vec!["a".into(), "b".into()]);
        report.record_failure(
            Stage::Run,
            Diagnostic::error(DiagnosticCode::EngineFailure, "run failed").with_node("b"),
        );

        assert!(report.has_errors());
        assert_eq!(report.summary.models_compiled, 2);
        assert_eq!(report.failed_stage(), Some(Stage::Run));
        assert_eq!(report.stages[2].models, vec!["b".to_string()]);
    }

    #[test]
    fn non_blocking_diagnostics_do_not_fail_the_build() {
        let mut report = BuildReport::new();
        report.add_diagnostic(Diagnostic::info(DiagnosticCode::ArtifactPruned, "removed old.sql"));
        report.add_diagnostic(Diagnostic::warn(
            DiagnosticCode::EngineSelectorDelegated,
            "selector passed through",
        ));

        assert!(!report.has_errors());
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.info, 1);
        assert_eq!(report.summary.warnings, 1);
    }

    #[test]
    fn report_serialization() {
        let report = BuildReport::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"stages\""));
        assert!(json.contains("\"diagnostics\""));
    }
}
