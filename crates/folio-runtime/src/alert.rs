//! Operator alerts for server-class failures.

use std::fmt::Write as _;
use std::sync::Arc;

use folio_core::context::InvocationContext;
use folio_core::errors::PipelineError;
use folio_core::ports::{NotificationChannel, NotifyError};
use serde::Serialize;

/// Subject line of every alert.
pub const ALERT_SUBJECT: &str = "Api error";

#[derive(Serialize)]
struct AlertBody<'a> {
    code: &'a str,
    message: &'a str,
    stack: &'a str,
}

/// Render the alert message for `err` raised during the invocation `ctx`.
pub fn format_alert(ctx: &InvocationContext, err: &PipelineError) -> String {
    let body = AlertBody {
        code: err.kind().code(),
        message: err.message(),
        stack: err.trace(),
    };
    let body = serde_json::to_string(&body).unwrap_or_else(|_| err.message().to_string());
    let locators = ctx.log_locators();

    let mut out = String::from("This is a back end notification message.\n\n");
    out.push_str("-------AWS CONTEXT :----\n");
    let _ = writeln!(out, "Remaining time : {}", ctx.remaining_time().as_millis());
    let _ = writeln!(out, "Function name : {}", ctx.function_name());
    let _ = writeln!(out, "AWSrequestID:{}", ctx.invocation_id());
    let _ = writeln!(out, "Log group name : {}", locators.group.as_deref().unwrap_or("unknown"));
    let _ = writeln!(out, "Log stream name : {}", locators.stream.as_deref().unwrap_or("unknown"));
    out.push_str("\n-------MESSAGE :---------\n");
    out.push_str(&body);
    out
}

/// Publishes alerts to a configured topic.
#[derive(Clone)]
pub struct Alerter {
    channel: Arc<dyn NotificationChannel>,
    topic: Option<String>,
}

impl Alerter {
    /// Alert through `channel` to `topic`. Without a topic every alert fails
    /// as not configured.
    pub fn new(channel: Arc<dyn NotificationChannel>, topic: Option<String>) -> Self {
        Self {
            channel,
            topic: topic.filter(|t| !t.is_empty()),
        }
    }

    /// Whether a topic is configured.
    pub fn is_configured(&self) -> bool {
        self.topic.is_some()
    }

    /// Publish one alert for `err`.
    pub async fn send(
        &self,
        ctx: Option<&InvocationContext>,
        err: &PipelineError,
    ) -> Result<(), NotifyError> {
        let Some(topic) = self.topic.as_deref() else {
            return Err(NotifyError::NotConfigured("no alert topic".into()));
        };
        let Some(ctx) = ctx else {
            return Err(NotifyError::NotConfigured("no invocation context".into()));
        };
        self.channel
            .publish(topic, &format_alert(ctx, err), ALERT_SUBJECT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use folio_core::context::LogLocators;
    use folio_core::errors::ErrorKind;
    use folio_core::ids::InvocationId;

    use super::*;
    use crate::testing::FakeChannel;

    const TOPIC: &str = "arn:aws:sns:eu-west-3:123456789012:alerts";

    fn ctx() -> InvocationContext {
        InvocationContext::new(
            InvocationId::from_string("req-42"),
            "render-fn",
            Duration::from_secs(120),
            LogLocators {
                group: Some("/aws/lambda/render-fn".into()),
                stream: None,
            },
        )
    }

    fn error() -> PipelineError {
        PipelineError::new(ErrorKind::PublishFailure, "upload rejected").with_trace("stage: publish")
    }

    #[test]
    fn payload_layout() {
        let text = format_alert(&ctx(), &error());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "This is a back end notification message.");
        assert_eq!(lines[2], "-------AWS CONTEXT :----");
        assert!(lines[3].starts_with("Remaining time : "));
        assert_eq!(lines[4], "Function name : render-fn");
        assert_eq!(lines[5], "AWSrequestID:req-42");
        assert_eq!(lines[6], "Log group name : /aws/lambda/render-fn");
        assert_eq!(lines[7], "Log stream name : unknown");
        assert_eq!(lines[9], "-------MESSAGE :---------");

        let body: serde_json::Value = serde_json::from_str(lines[10]).unwrap();
        assert_eq!(body["code"], "publishFailure");
        assert_eq!(body["message"], "upload rejected");
        assert_eq!(body["stack"], "stage: publish");
    }

    #[tokio::test]
    async fn send_publishes_with_subject() {
        let channel = FakeChannel::new();
        let alerter = Alerter::new(Arc::new(channel.clone()), Some(TOPIC.into()));
        alerter.send(Some(&ctx()), &error()).await.unwrap();

        let attempts = channel.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].topic, TOPIC);
        assert_eq!(attempts[0].subject, ALERT_SUBJECT);
        assert!(attempts[0].message.contains("AWSrequestID:req-42"));
    }

    #[tokio::test]
    async fn missing_topic_or_context_is_not_configured() {
        let channel = FakeChannel::new();
        let unconfigured = Alerter::new(Arc::new(channel.clone()), Some(String::new()));
        assert!(!unconfigured.is_configured());
        assert_matches!(
            unconfigured.send(Some(&ctx()), &error()).await,
            Err(NotifyError::NotConfigured(msg)) if msg == "no alert topic"
        );

        let alerter = Alerter::new(Arc::new(channel.clone()), Some(TOPIC.into()));
        assert_matches!(
            alerter.send(None, &error()).await,
            Err(NotifyError::NotConfigured(msg)) if msg == "no invocation context"
        );
        assert!(channel.attempts().is_empty());
    }
}
