//! Errors from loading and driving a project

use flowdbt_compiler::TemplateStoreError;
use flowdbt_core::{ConfigError, Diagnostic, DiagnosticCode, FlowError};
use flowdbt_engine::InspectError;
use flowdbt_graph::{CatalogError, NodeFileError};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Nodes(#[from] NodeFileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Templates(#[from] TemplateStoreError),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

pub type ProjectResult<T> = Result<T, ProjectError>;

impl ProjectError {
    /// Loading problems map to `CONFIG_FILE_ERROR`; pipeline errors keep their own code
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Flow(e) => e.to_diagnostic(),
            Self::Inspect(InspectError::QueryFailed { relation, message }) => {
                Diagnostic::error(DiagnosticCode::InspectFailure, self.to_string())
                    .with_node(relation)
                    .with_payload(message)
            }
            Self::Inspect(_) => Diagnostic::error(DiagnosticCode::InspectFailure, self.to_string()),
            Self::Config(_) | Self::Nodes(_) | Self::Catalog(_) | Self::Templates(_) => {
                Diagnostic::error(DiagnosticCode::ConfigFileError, self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdbt_core::{ConfigurationError, Severity};

    #[test]
    fn loading_errors_become_config_file_diagnostics() {
        let err = ProjectError::from(ConfigError::ParseError("expected `=`".into()));
        let diag = err.to_diagnostic();

        assert_eq!(diag.code, DiagnosticCode::ConfigFileError);
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.message.contains("expected `=`"));
    }

    #[test]
    fn failed_query_keeps_relation_and_output() {
        let err = ProjectError::from(InspectError::QueryFailed {
            relation: "orders".into(),
            message: "Catalog Error: Table with name orders does not exist".into(),
        });
        let diag = err.to_diagnostic();

        assert_eq!(diag.code, DiagnosticCode::InspectFailure);
        assert_eq!(diag.node.as_deref(), Some("orders"));
        assert!(diag.payload.unwrap().starts_with("Catalog Error"));
    }

    #[test]
    fn pipeline_errors_keep_their_code() {
        let err = ProjectError::from(FlowError::from(ConfigurationError::UnknownNode("z".into())));
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::ConfigUnknownNode);
    }
}
