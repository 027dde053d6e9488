//! Bounded, cancellable access to an open engine adapter

use std::future::Future;
use std::time::Duration;

use flowdbt_core::EngineError;
use tokio_util::sync::CancellationToken;

use crate::adapter::{EngineAdapter, EngineOperation, EngineOutcome};

/// An opened adapter plus the wait bound and cancellation token for its calls
pub struct EngineSession {
    adapter: Box<dyn EngineAdapter>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl EngineSession {
    /// Open `adapter` and wrap it
    pub async fn open<A>(mut adapter: A, timeout: Duration) -> Result<Self, EngineError>
    where
        A: EngineAdapter + 'static,
    {
        adapter.open().await?;
        tracing::info!(adapter = adapter.name(), timeout_secs = timeout.as_secs(), "engine session opened");

        Ok(Self {
            adapter: Box::new(adapter),
            timeout,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned token, e.g. one tied to Ctrl-C
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub async fn seed(&self) -> Result<String, EngineError> {
        self.call(EngineOperation::Seed, self.adapter.load_base_data()).await
    }

    pub async fn execute(&self, selector: Option<&str>) -> Result<String, EngineError> {
        self.call(EngineOperation::Run, self.adapter.execute(selector)).await
    }

    pub async fn clean(&self) -> Result<String, EngineError> {
        self.call(EngineOperation::Clean, self.adapter.clean()).await
    }

    pub async fn close(mut self) -> Result<(), EngineError> {
        self.adapter.close().await?;
        tracing::info!(adapter = self.adapter.name(), "engine session closed");
        Ok(())
    }

    async fn call<F>(&self, operation: EngineOperation, fut: F) -> Result<String, EngineError>
    where
        F: Future<Output = Result<EngineOutcome, EngineError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled {
                operation: operation.to_string(),
            });
        }

        tracing::debug!(%operation, adapter = self.adapter.name(), "engine call started");

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled {
                operation: operation.to_string(),
            }),
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(outcome) => outcome.and_then(|o| o.into_result(operation)),
                Err(_) => Err(EngineError::TimedOut {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }),
            },
        };

        match &result {
            Ok(_) => tracing::debug!(%operation, "engine call succeeded"),
            Err(e) => tracing::warn!(%operation, error = %e, "engine call failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{EngineCall, MockEngine};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn calls_are_forwarded_and_recorded() {
        let engine = MockEngine::new();
        let session = EngineSession::open(engine.clone(), Duration::from_secs(5)).await.unwrap();

        session.seed().await.unwrap();
        session.execute(Some("+b+")).await.unwrap();
        session.clean().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(
            engine.calls().await,
            vec![
                EngineCall::Open,
                EngineCall::Seed,
                EngineCall::Execute(Some("+b+".into())),
                EngineCall::Clean,
                EngineCall::Close,
            ]
        );
    }

    #[tokio::test]
    async fn failure_payload_is_verbatim() {
        let engine = MockEngine::new().with_failure(EngineOperation::Seed, "seed file data.csv is malformed");
        let session = EngineSession::open(engine, Duration::from_secs(5)).await.unwrap();

        let err = session.seed().await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Failed {
                operation: "seed".into(),
                diagnostics: "seed file data.csv is malformed".into()
            }
        );
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let engine = MockEngine::new().with_latency(200);
        let session = EngineSession::open(engine, Duration::from_millis(20)).await.unwrap();

        let err = session.execute(None).await.unwrap_err();
        assert!(matches!(err, EngineError::TimedOut { ref operation, .. } if operation == "run"));
    }

    #[tokio::test]
    async fn cancelled_token_stops_calls() {
        let engine = MockEngine::new().with_latency(500);
        let session = EngineSession::open(engine.clone(), Duration::from_secs(5)).await.unwrap();
        let token = session.cancellation_token();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = session.execute(None).await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, EngineError::Cancelled { .. }));

        // Already cancelled: nothing reaches the adapter
        let err = session.clean().await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled { ref operation } if operation == "clean"));
        assert!(!engine.calls().await.contains(&EngineCall::Clean));
    }

    #[tokio::test]
    async fn open_failure_is_reported() {
        let engine = MockEngine::new().with_open_failure();
        let err = EngineSession::open(engine, Duration::from_secs(5)).await.err().unwrap();
        assert!(matches!(err, EngineError::Spawn(_)));
    }
}
