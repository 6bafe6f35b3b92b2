//! Orchestrator: runs one invocation end to end.

use std::sync::Arc;
use std::time::Duration;

use folio_core::context::InvocationContext;
use folio_core::errors::{ErrorKind, PipelineError};
use folio_core::ports::{BrowserEngine, LaunchConfig, NotificationChannel, ObjectStore};
use folio_core::request::RenderRequest;
use folio_core::response::{PublishedArtifact, RenderResult};
use folio_core::validate::{extract_body, validate};
use serde_json::Value;
use tracing::Instrument;

use crate::alert::Alerter;
use crate::dispatcher::{Dispatched, ResponseDispatcher};
use crate::publisher::ArtifactPublisher;
use crate::session::RenderSession;

/// Deployment-level pipeline options.
#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    /// Accept invalid TLS certificates when loading content.
    pub ignore_https_errors: bool,
    /// Notification topic for server-class failures.
    pub alert_topic: Option<String>,
}

/// Sequences validation, rendering, publishing, and dispatch.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn BrowserEngine>,
    publisher: ArtifactPublisher,
    alerter: Arc<Alerter>,
    ignore_https_errors: bool,
}

impl Orchestrator {
    /// Wire the pipeline to its collaborators.
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        store: Arc<dyn ObjectStore>,
        channel: Arc<dyn NotificationChannel>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            engine,
            publisher: ArtifactPublisher::new(store),
            alerter: Arc::new(Alerter::new(channel, options.alert_topic)),
            ignore_https_errors: options.ignore_https_errors,
        }
    }

    /// A fresh, unbound dispatcher sharing this pipeline's alerter.
    pub fn dispatcher(&self) -> ResponseDispatcher {
        ResponseDispatcher::new(Arc::clone(&self.alerter))
    }

    /// Handle a host event envelope (`{"body": ...}`).
    pub async fn handle_event(&self, event: &Value, context: InvocationContext) -> Dispatched {
        let span = tracing::info_span!("invocation", invocation_id = %context.invocation_id());
        async move {
            let budget = context.remaining_time();
            let dispatcher = self.dispatcher().bind(context);
            let outcome = match extract_body(event) {
                Ok(body) => self.run(&body, budget).await,
                Err(e) => Err(e),
            };
            dispatcher.dispatch(outcome)
        }
        .instrument(span)
        .await
    }

    /// Handle a raw request body.
    pub async fn handle_body(&self, body: &Value, context: InvocationContext) -> Dispatched {
        let span = tracing::info_span!("invocation", invocation_id = %context.invocation_id());
        async move {
            let budget = context.remaining_time();
            let dispatcher = self.dispatcher().bind(context);
            dispatcher.dispatch(self.run(body, budget).await)
        }
        .instrument(span)
        .await
    }

    /// Validate, render, and publish. Stops at the first failure.
    ///
    /// A request that fails validation never reaches the engine. Launch,
    /// page setup and render together must finish within `budget`; the page
    /// itself waits without a timeout. Once the session exists it is closed
    /// exactly once, whether rendering succeeded, failed or ran out of time,
    /// before the artifact is published.
    pub async fn run(&self, body: &Value, budget: Duration) -> Result<PublishedArtifact, PipelineError> {
        let request = validate(body)?;
        tracing::debug!(
            file_name = request.file_name(),
            format = request.output_format().as_str(),
            bucket = %request.destination().bucket_name,
            "request validated"
        );

        let mut session = RenderSession::new(Arc::clone(&self.engine));
        let rendered = match tokio::time::timeout(budget, self.render(&mut session, &request)).await {
            Ok(rendered) => rendered,
            Err(_) => {
                tracing::warn!(budget_ms = budget.as_millis(), state = %session.state(), "render timed out");
                Err(PipelineError::new(
                    ErrorKind::RenderFailure,
                    format!("render did not finish within {} ms", budget.as_millis()),
                )
                .with_trace(format!("stage: render\nsession: {}", session.state())))
            }
        };
        session.close().await;

        self.publisher.publish(rendered?).await
    }

    async fn render(
        &self,
        session: &mut RenderSession,
        request: &RenderRequest,
    ) -> Result<RenderResult, PipelineError> {
        let config = LaunchConfig {
            viewport: request.viewport(),
            ignore_https_errors: self.ignore_https_errors,
        };
        session.launch(&config).await?;
        session.prepare(request).await?;
        session.render(request).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{FakeChannel, FakeEngine, FakeStore};

    const BUDGET: Duration = Duration::from_secs(30);

    fn orchestrator(engine: &FakeEngine) -> Orchestrator {
        Orchestrator::new(
            Arc::new(engine.clone()),
            Arc::new(FakeStore::new()),
            Arc::new(FakeChannel::new()),
            PipelineOptions {
                ignore_https_errors: true,
                alert_topic: Some("arn:aws:sns:eu-west-3:1:alerts".into()),
            },
        )
    }

    #[tokio::test]
    async fn launch_config_carries_viewport() {
        let engine = FakeEngine::new();
        let _ = orchestrator(&engine)
            .run(
                &json!({
                    "fileName": "a.pdf",
                    "html": "<p>x</p>",
                    "defaultViewport": { "width": 800, "height": 600 },
                    "s3Bucket": { "name": "bucket1" }
                }),
                BUDGET,
            )
            .await
            .unwrap();

        let configs = engine.launch_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].viewport.width, 800);
        assert_eq!(configs[0].viewport.height, 600);
        assert!(configs[0].ignore_https_errors);
    }

    #[tokio::test]
    async fn session_closed_before_error_propagates() {
        let engine = FakeEngine::new().failing_on("render_document");
        let err = orchestrator(&engine)
            .run(
                &json!({
                    "fileName": "a.pdf",
                    "url": "https://example.com",
                    "s3Bucket": { "name": "bucket1" }
                }),
                BUDGET,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailure);
        assert_eq!(engine.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_page_is_cut_off_at_budget() {
        let engine = FakeEngine::new().hanging_on("goto");
        let err = orchestrator(&engine)
            .run(
                &json!({
                    "fileName": "a.pdf",
                    "url": "https://example.com",
                    "s3Bucket": { "name": "bucket1" }
                }),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RenderFailure);
        assert_eq!(err.message(), "render did not finish within 50 ms");
        assert!(err.trace().contains("session: content-loading"));
        assert_eq!(engine.closes(), 1);
    }
}
