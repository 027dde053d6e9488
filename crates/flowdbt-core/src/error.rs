//! Error taxonomy shared by every stage of the pipeline
//!
//! All errors are fatal for the pass that raised them. Nothing here is retried:
//! compilation is deterministic and engine failures need a human.

use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// Structural problems with the declared graph, detected before compilation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Node '{node}' has unregistered type '{node_type}'")]
    UnknownType { node: String, node_type: String },

    #[error("No models found in graph")]
    EmptyGraph,

    #[error("Node name '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Node name '{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("Node '{node}' references '{reference}', which is neither a node nor a data source")]
    UnresolvedReference { node: String, reference: String },

    #[error("Node '{0}' shadows a data source of the same name")]
    AmbiguousReference(String),

    #[error("A resolver for type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),
}

impl ConfigurationError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::UnknownType { .. } => DiagnosticCode::ConfigUnknownType,
            Self::EmptyGraph => DiagnosticCode::ConfigEmptyGraph,
            Self::DuplicateName(_) => DiagnosticCode::ConfigDuplicateName,
            Self::EmptyName | Self::InvalidName(_) => DiagnosticCode::ConfigInvalidName,
            Self::UnresolvedReference { .. } => DiagnosticCode::ConfigUnresolvedReference,
            Self::AmbiguousReference(_) => DiagnosticCode::ConfigAmbiguousReference,
            Self::DuplicateType(_) => DiagnosticCode::ConfigDuplicateType,
            Self::UnknownNode(_) => DiagnosticCode::ConfigUnknownNode,
        }
    }

    fn node(&self) -> Option<&str> {
        match self {
            Self::UnknownType { node, .. } | Self::UnresolvedReference { node, .. } => Some(node),
            Self::DuplicateName(node)
            | Self::InvalidName(node)
            | Self::AmbiguousReference(node)
            | Self::UnknownNode(node) => Some(node),
            Self::EmptyGraph | Self::EmptyName | Self::DuplicateType(_) => None,
        }
    }
}

/// A single node failed its type's contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Node '{node}' of type '{node_type}' expects {expected} upstream input(s), got {actual}")]
    ArityMismatch {
        node: String,
        node_type: String,
        expected: usize,
        actual: usize,
    },

    #[error("Node '{node}' is missing required setting '{setting}'")]
    MissingSetting { node: String, setting: String },

    #[error("Node '{node}' has unknown setting '{setting}'")]
    UnknownSetting { node: String, setting: String },

    #[error("Node '{node}' has invalid value for '{setting}': {reason}")]
    InvalidSetting {
        node: String,
        setting: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::ArityMismatch { .. } => DiagnosticCode::ValidationArityMismatch,
            Self::MissingSetting { .. } => DiagnosticCode::ValidationMissingSetting,
            Self::UnknownSetting { .. } => DiagnosticCode::ValidationUnknownSetting,
            Self::InvalidSetting { .. } => DiagnosticCode::ValidationInvalidSetting,
        }
    }

    pub fn node(&self) -> &str {
        match self {
            Self::ArityMismatch { node, .. }
            | Self::MissingSetting { node, .. }
            | Self::UnknownSetting { node, .. }
            | Self::InvalidSetting { node, .. } => node,
        }
    }
}

/// The upstream relation is not acyclic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cycle detected: {}", .cycle.join(" -> "))]
pub struct CyclicGraphError {
    /// One concrete cycle, first node repeated at the end
    pub cycle: Vec<String>,
}

/// No template body is registered for a type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No template registered for type '{node_type}' (needed by node '{node}')")]
pub struct TemplateNotFoundError {
    pub node: String,
    pub node_type: String,
}

/// Rendering failed, typically a slot the resolver did not provide
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to render template for node '{node}': {message}")]
pub struct TemplateRenderError {
    pub node: String,
    pub message: String,
}

/// Failure writing or removing compiled artifacts
#[derive(Debug, thiserror::Error)]
#[error("Artifact I/O failed for {path}: {source}")]
pub struct ArtifactError {
    pub path: std::path::PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failure at the external engine boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine operation '{operation}' failed")]
    Failed {
        operation: String,
        diagnostics: String,
    },

    #[error("Engine operation '{operation}' timed out after {seconds}s")]
    TimedOut { operation: String, seconds: u64 },

    #[error("Engine operation '{operation}' was cancelled")]
    Cancelled { operation: String },

    #[error("Failed to start engine: {0}")]
    Spawn(String),

    #[error("Engine adapter '{0}' is not open")]
    NotOpen(String),
}

impl EngineError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Failed { .. } => DiagnosticCode::EngineFailure,
            Self::TimedOut { .. } => DiagnosticCode::EngineTimeout,
            Self::Cancelled { .. } => DiagnosticCode::EngineCancelled,
            Self::Spawn(_) | Self::NotOpen(_) => DiagnosticCode::EngineUnavailable,
        }
    }
}

/// Umbrella error for the whole pipeline
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cycle(#[from] CyclicGraphError),

    #[error(transparent)]
    TemplateNotFound(#[from] TemplateNotFoundError),

    #[error(transparent)]
    Render(#[from] TemplateRenderError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl FlowError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Configuration(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Cycle(_) => DiagnosticCode::GraphCycle,
            Self::TemplateNotFound(_) => DiagnosticCode::TemplateNotFound,
            Self::Render(_) => DiagnosticCode::TemplateRenderError,
            Self::Artifact(_) => DiagnosticCode::ArtifactWriteError,
            Self::Engine(e) => e.code(),
        }
    }

    /// Convert to a report diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code(), self.to_string());

        match self {
            Self::Configuration(e) => match e.node() {
                Some(node) => diag.with_node(node),
                None => diag,
            },
            Self::Validation(e) => {
                let diag = diag.with_node(e.node());
                if let ValidationError::ArityMismatch { expected, actual, .. } = e {
                    diag.with_comparison(expected.to_string(), actual.to_string())
                } else {
                    diag
                }
            }
            Self::Cycle(e) => match e.cycle.first() {
                Some(node) => diag.with_node(node.clone()),
                None => diag,
            },
            Self::TemplateNotFound(e) => diag.with_node(e.node.clone()),
            Self::Render(e) => diag.with_node(e.node.clone()),
            Self::Artifact(_) => diag,
            Self::Engine(EngineError::Failed { diagnostics, .. }) => diag.with_payload(diagnostics.clone()),
            Self::Engine(_) => diag,
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
