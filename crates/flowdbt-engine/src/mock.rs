//! Mock engine adapter for testing
//!
//! Records every call it receives and answers with canned outcomes, without
//! spawning any process. Clones share the call log, so a test can hand one
//! clone to an `EngineSession` and inspect the other afterwards.
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // The engine reports a failed seed
//! let engine = MockEngine::new().with_failure(EngineOperation::Seed, "bad csv");
//!
//! // Running model `b` fails, everything else succeeds
//! let engine = MockEngine::new().with_failing_selector("b", "division by zero");
//!
//! // Simulate a slow engine
//! let engine = MockEngine::new().with_latency(100);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowdbt_core::EngineError;
use tokio::sync::RwLock;

use crate::adapter::{EngineAdapter, EngineOperation, EngineOutcome};

/// One call the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Open,
    Seed,
    Execute(Option<String>),
    Clean,
    Close,
}

#[derive(Clone)]
pub struct MockEngine {
    /// Calls in arrival order, shared between clones
    calls: Arc<RwLock<Vec<EngineCall>>>,

    /// Failed outcomes per operation
    failures: HashMap<EngineOperation, String>,

    /// Failed outcomes for `execute` with a specific selector
    failing_selectors: HashMap<String, String>,

    fail_open: bool,

    /// Simulated engine latency (milliseconds)
    latency_ms: u64,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: HashMap::new(),
            failing_selectors: HashMap::new(),
            fail_open: false,
            latency_ms: 0,
        }
    }

    pub fn with_failure(mut self, operation: EngineOperation, diagnostics: impl Into<String>) -> Self {
        self.failures.insert(operation, diagnostics.into());
        self
    }

    pub fn with_failing_selector(mut self, selector: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        self.failing_selectors.insert(selector.into(), diagnostics.into());
        self
    }

    pub fn with_open_failure(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.calls.read().await.clone()
    }

    /// Selectors passed to `execute`, in order
    pub async fn executed(&self) -> Vec<Option<String>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                EngineCall::Execute(selector) => Some(selector.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn reset(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: EngineCall) {
        self.calls.write().await.push(call);
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }

    fn outcome(&self, operation: EngineOperation) -> EngineOutcome {
        match self.failures.get(&operation) {
            Some(diagnostics) => EngineOutcome::failure(diagnostics.clone()),
            None => EngineOutcome::success(format!("mock {operation} ok")),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngineAdapter for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Open).await;

        if self.fail_open {
            return Err(EngineError::Spawn("mock engine refused to open".into()));
        }
        Ok(())
    }

    async fn load_base_data(&self) -> Result<EngineOutcome, EngineError> {
        self.record(EngineCall::Seed).await;
        self.simulate_latency().await;
        Ok(self.outcome(EngineOperation::Seed))
    }

    async fn execute(&self, selector: Option<&str>) -> Result<EngineOutcome, EngineError> {
        self.record(EngineCall::Execute(selector.map(str::to_string))).await;
        self.simulate_latency().await;

        if let Some(diagnostics) = selector.and_then(|s| self.failing_selectors.get(s)) {
            return Ok(EngineOutcome::failure(diagnostics.clone()));
        }
        Ok(self.outcome(EngineOperation::Run))
    }

    async fn clean(&self) -> Result<EngineOutcome, EngineError> {
        self.record(EngineCall::Clean).await;
        self.simulate_latency().await;
        Ok(self.outcome(EngineOperation::Clean))
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Close).await;
        Ok(())
    }
}
