//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Configuration errors (1xxx)
    /// A node declares a type no resolver is registered for
    ConfigUnknownType,

    /// No nodes were declared
    ConfigEmptyGraph,

    /// Two nodes share the same name
    ConfigDuplicateName,

    /// A node name is empty or not a valid identifier
    ConfigInvalidName,

    /// An upstream reference is neither a node nor a data source
    ConfigUnresolvedReference,

    /// A node name shadows a declared data source
    ConfigAmbiguousReference,

    /// A resolver was registered twice for the same type
    ConfigDuplicateType,

    /// A selector or lookup names a node that does not exist
    ConfigUnknownNode,

    /// A project input file could not be read or parsed
    ConfigFileError,

    // Node validation (2xxx)
    /// Upstream count does not match the type's arity
    ValidationArityMismatch,

    /// A required setting is absent
    ValidationMissingSetting,

    /// A setting the type does not understand
    ValidationUnknownSetting,

    /// A setting value is malformed
    ValidationInvalidSetting,

    // Graph structure (3xxx)
    /// The upstream relation contains a cycle
    GraphCycle,

    // Templates (4xxx)
    /// No template body registered for a type
    TemplateNotFound,

    /// Template failed to render with the resolved parameters
    TemplateRenderError,

    /// Writing a compiled artifact failed
    ArtifactWriteError,

    /// A model file no current node produces was removed
    ArtifactPruned,

    // External engine (5xxx)
    /// The engine reported a failed operation
    EngineFailure,

    /// The engine did not finish within the allotted time
    EngineTimeout,

    /// The engine call was cancelled
    EngineCancelled,

    /// The engine could not be started
    EngineUnavailable,

    /// A selector was handed to the engine, which sees no model dependencies
    EngineSelectorDelegated,

    // Results (6xxx)
    /// Materialized rows could not be read back
    InspectFailure,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigUnknownType => "CONFIG_UNKNOWN_TYPE",
            Self::ConfigEmptyGraph => "CONFIG_EMPTY_GRAPH",
            Self::ConfigDuplicateName => "CONFIG_DUPLICATE_NAME",
            Self::ConfigInvalidName => "CONFIG_INVALID_NAME",
            Self::ConfigUnresolvedReference => "CONFIG_UNRESOLVED_REFERENCE",
            Self::ConfigAmbiguousReference => "CONFIG_AMBIGUOUS_REFERENCE",
            Self::ConfigDuplicateType => "CONFIG_DUPLICATE_TYPE",
            Self::ConfigUnknownNode => "CONFIG_UNKNOWN_NODE",
            Self::ConfigFileError => "CONFIG_FILE_ERROR",
            Self::ValidationArityMismatch => "VALIDATION_ARITY_MISMATCH",
            Self::ValidationMissingSetting => "VALIDATION_MISSING_SETTING",
            Self::ValidationUnknownSetting => "VALIDATION_UNKNOWN_SETTING",
            Self::ValidationInvalidSetting => "VALIDATION_INVALID_SETTING",
            Self::GraphCycle => "GRAPH_CYCLE",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::TemplateRenderError => "TEMPLATE_RENDER_ERROR",
            Self::ArtifactWriteError => "ARTIFACT_WRITE_ERROR",
            Self::ArtifactPruned => "ARTIFACT_PRUNED",
            Self::EngineFailure => "ENGINE_FAILURE",
            Self::EngineTimeout => "ENGINE_TIMEOUT",
            Self::EngineCancelled => "ENGINE_CANCELLED",
            Self::EngineUnavailable => "ENGINE_UNAVAILABLE",
            Self::EngineSelectorDelegated => "ENGINE_SELECTOR_DELEGATED",
            Self::InspectFailure => "INSPECT_FAILURE",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that aborts the build
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Node the diagnostic is about, if any
    pub node: Option<String>,

    /// Expected value (for comparison diagnostics)
    pub expected: Option<String>,

    /// Actual value (for comparison diagnostics)
    pub actual: Option<String>,

    /// Opaque payload from the external engine, passed through verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            node: None,
            expected: None,
            actual: None,
            payload: None,
        }
    }

    /// Shorthand for an error-level diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    /// Set the node
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Attach an engine payload
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}
