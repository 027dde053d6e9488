//! flowdbt core
//!
//! Error taxonomy, diagnostics, configuration and the build report shared by
//! every other crate. Never rename diagnostic codes - they are part of the
//! public API.

pub mod diagnostic;
pub mod error;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use error::{
    ArtifactError, ConfigurationError, CyclicGraphError, EngineError, FlowError, FlowResult,
    TemplateNotFoundError, TemplateRenderError, ValidationError,
};
pub use report::{BuildReport, ReportVersion, Stage, StageOutcome, StageStatus};
pub use config::{
    Config, ConfigError, EngineConfig, InspectConfig, InvocationStrategy, SourcesConfig,
    DEPENDENCY_MANIFEST_NAME,
};
