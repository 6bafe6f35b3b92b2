//! Turns a pipeline outcome into the normalized response, alerting on
//! server-class failures.

use std::sync::Arc;

use folio_core::context::InvocationContext;
use folio_core::errors::PipelineError;
use folio_core::response::{NormalizedResponse, PublishedArtifact};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::alert::Alerter;

/// Response dispatcher for one invocation.
///
/// Bind it to the invocation's context with [`ResponseDispatcher::bind`]
/// before dispatching. [`ResponseDispatcher::dispatch`] consumes it, so an
/// invocation dispatches at most once.
pub struct ResponseDispatcher {
    alerter: Arc<Alerter>,
    context: Option<InvocationContext>,
}

/// A dispatched response and the alert still in flight, if any.
pub struct Dispatched {
    /// Response to hand back to the host.
    pub response: NormalizedResponse,
    /// Alert delivery; await it before the invocation ends.
    pub alert: PendingAlert,
}

impl Dispatched {
    /// Wait for the alert and return the response.
    pub async fn complete(self) -> NormalizedResponse {
        self.alert.wait().await;
        self.response
    }
}

/// Handle to a best-effort alert publish.
#[derive(Debug, Default)]
pub struct PendingAlert(Option<JoinHandle<()>>);

impl PendingAlert {
    /// Whether an alert was started.
    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    /// Whether the alert task has run to completion (or none was started).
    pub fn is_finished(&self) -> bool {
        self.0.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the alert task. Its outcome is already logged.
    pub async fn wait(self) {
        if let Some(handle) = self.0 {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "alert task did not finish");
            }
        }
    }
}

impl ResponseDispatcher {
    /// An unbound dispatcher alerting through `alerter`.
    pub fn new(alerter: Arc<Alerter>) -> Self {
        Self {
            alerter,
            context: None,
        }
    }

    /// Attach the invocation context.
    #[must_use]
    pub fn bind(mut self, context: InvocationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether a context is bound.
    pub fn is_bound(&self) -> bool {
        self.context.is_some()
    }

    /// Build the response for `outcome`.
    ///
    /// `InvalidInput` maps to 400; every other failure maps to 500 and
    /// starts an alert on the current Tokio runtime. An unbound dispatcher
    /// answers 500 `Internal` regardless of `outcome`.
    pub fn dispatch(self, outcome: Result<PublishedArtifact, PipelineError>) -> Dispatched {
        let outcome = if self.context.is_some() {
            outcome
        } else {
            let detail = match &outcome {
                Ok(artifact) => format!("outcome: published {}", artifact.public_url),
                Err(err) => format!("outcome: {} {}", err.kind(), err.message()),
            };
            Err(PipelineError::internal("response context not initialized").with_trace(detail))
        };

        match outcome {
            Ok(artifact) => {
                tracing::info!(url = %artifact.public_url, "artifact published");
                Dispatched {
                    response: NormalizedResponse::ok(&artifact),
                    alert: PendingAlert::default(),
                }
            }
            Err(err) => {
                let kind = err.kind();
                let response = NormalizedResponse::new(kind.status_code(), &err.message());
                if !kind.is_server_error() {
                    tracing::warn!(kind = %kind, error = %err, "request rejected");
                    return Dispatched {
                        response,
                        alert: PendingAlert::default(),
                    };
                }

                tracing::error!(kind = %kind, error = %err, trace = %err.trace(), "invocation failed");
                let alert = self.spawn_alert(err);
                Dispatched { response, alert }
            }
        }
    }

    fn spawn_alert(self, err: PipelineError) -> PendingAlert {
        let Self { alerter, context } = self;
        let task = async move {
            match alerter.send(context.as_ref(), &err).await {
                Ok(()) => tracing::info!("alert sent"),
                Err(e) => tracing::warn!(error = %e, "alert failed"),
            }
        };
        PendingAlert(Some(tokio::spawn(task.instrument(tracing::Span::current()))))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use folio_core::context::LogLocators;
    use folio_core::errors::{ErrorKind, Rule, Violation};
    use folio_core::ids::InvocationId;
    use folio_core::logging::capture_logs;
    use tracing::Level;

    use super::*;
    use crate::testing::FakeChannel;

    const TOPIC: &str = "arn:aws:sns:eu-west-3:123456789012:alerts";

    fn ctx() -> InvocationContext {
        InvocationContext::new(
            InvocationId::from_string("req-1"),
            "folio",
            Duration::from_secs(60),
            LogLocators::default(),
        )
    }

    fn dispatcher(channel: &FakeChannel) -> ResponseDispatcher {
        ResponseDispatcher::new(Arc::new(Alerter::new(
            Arc::new(channel.clone()),
            Some(TOPIC.into()),
        )))
    }

    #[tokio::test]
    async fn success_is_200_without_alert() {
        let channel = FakeChannel::new();
        let dispatched = dispatcher(&channel).bind(ctx()).dispatch(Ok(PublishedArtifact {
            public_url: "https://b.s3.eu-west-3.amazonaws.com/a.pdf".into(),
        }));
        assert!(!dispatched.alert.is_pending());
        let response = dispatched.complete().await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"url":"https://b.s3.eu-west-3.amazonaws.com/a.pdf"}"#);
        assert!(channel.attempts().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_400_without_alert() {
        let channel = FakeChannel::new();
        let err = PipelineError::invalid_input(vec![Violation::new("fileName", Rule::Required)]);
        let response = dispatcher(&channel).bind(ctx()).dispatch(Err(err)).complete().await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, r#""fileName is required""#);
        assert!(channel.attempts().is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_500_with_one_alert() {
        for kind in [ErrorKind::RenderFailure, ErrorKind::PublishFailure, ErrorKind::Internal] {
            let channel = FakeChannel::new();
            let err = PipelineError::new(kind, "boom").with_trace("secret trace");
            let dispatched = dispatcher(&channel).bind(ctx()).dispatch(Err(err));
            assert!(dispatched.alert.is_pending());
            let response = dispatched.complete().await;

            assert_eq!(response.status_code, 500);
            assert_eq!(response.body, r#""boom""#);
            assert!(!response.body.contains("secret trace"));
            assert_eq!(channel.attempts().len(), 1);
        }
    }

    #[tokio::test]
    async fn response_is_ready_before_alert_completes() {
        let channel = FakeChannel::new().with_delay(Duration::from_millis(50));
        let dispatched = dispatcher(&channel)
            .bind(ctx())
            .dispatch(Err(PipelineError::internal("boom")));

        assert_eq!(dispatched.response.status_code, 500);
        assert!(channel.attempts().is_empty());
        dispatched.alert.wait().await;
        assert_eq!(channel.attempts().len(), 1);
    }

    #[tokio::test]
    async fn unbound_dispatch_is_internal() {
        let (logs, _guard) = capture_logs();
        let channel = FakeChannel::new();
        let dispatcher = dispatcher(&channel);
        assert!(!dispatcher.is_bound());

        let response = dispatcher
            .dispatch(Ok(PublishedArtifact {
                public_url: "https://b.s3.eu-west-3.amazonaws.com/a.pdf".into(),
            }))
            .complete()
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, r#""response context not initialized""#);
        assert!(channel.attempts().is_empty());
        assert!(logs.has_event(Level::WARN, "alert failed"));
    }

    #[tokio::test]
    async fn alert_failure_is_logged_only() {
        let (logs, _guard) = capture_logs();
        let channel = FakeChannel::failing();
        let response = dispatcher(&channel)
            .bind(ctx())
            .dispatch(Err(PipelineError::internal("boom")))
            .complete()
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(channel.attempts().len(), 1);
        assert!(logs.has_event(Level::WARN, "alert failed"));
        assert!(logs.has_event(Level::ERROR, "invocation failed"));
    }
}
