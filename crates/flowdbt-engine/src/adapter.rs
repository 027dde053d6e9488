//! Engine adapter trait for the external transformation engine

use flowdbt_core::EngineError;
use std::fmt;

/// Operations the engine exposes to the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    /// Load base data (`seed`)
    Seed,

    /// Execute compiled artifacts (`run`)
    Run,

    /// Remove engine build products (`clean`)
    Clean,
}

impl EngineOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Run => "run",
            Self::Clean => "clean",
        }
    }
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine reported: success or failure plus an opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutcome {
    pub success: bool,

    /// Engine output, never interpreted by the core
    pub diagnostics: String,
}

impl EngineOutcome {
    pub fn success(diagnostics: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn failure(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: diagnostics.into(),
        }
    }

    /// Turn a failed outcome into `EngineError::Failed`
    pub fn into_result(self, operation: EngineOperation) -> Result<String, EngineError> {
        if self.success {
            Ok(self.diagnostics)
        } else {
            Err(EngineError::Failed {
                operation: operation.to_string(),
                diagnostics: self.diagnostics,
            })
        }
    }
}

/// Trait for adapters that drive the external engine
///
/// An adapter is constructed explicitly, opened before use and closed when
/// the caller is done with it. `Err` means the adapter itself could not do
/// its job; an engine that ran and failed is an `Ok` outcome with
/// `success == false`.
#[async_trait::async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Get the adapter name (e.g., "dbt")
    fn name(&self) -> &'static str;

    /// Prepare the adapter for use
    async fn open(&mut self) -> Result<(), EngineError>;

    /// Load base data into the backing store
    async fn load_base_data(&self) -> Result<EngineOutcome, EngineError>;

    /// Execute compiled artifacts, optionally restricted by a selector
    async fn execute(&self, selector: Option<&str>) -> Result<EngineOutcome, EngineError>;

    /// Remove build products the engine created
    async fn clean(&self) -> Result<EngineOutcome, EngineError>;

    /// Release anything `open` acquired
    async fn close(&mut self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_becomes_engine_error() {
        let err = EngineOutcome::failure("Compilation Error in model b")
            .into_result(EngineOperation::Run)
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::Failed {
                operation: "run".into(),
                diagnostics: "Compilation Error in model b".into()
            }
        );
    }

    #[test]
    fn successful_outcome_passes_diagnostics_through() {
        let out = EngineOutcome::success("Completed successfully")
            .into_result(EngineOperation::Seed)
            .unwrap();
        assert_eq!(out, "Completed successfully");
    }
}
