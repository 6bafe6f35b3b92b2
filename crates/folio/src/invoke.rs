//! `folio invoke`: one event in, one response out.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use folio_core::context::InvocationContext;
use folio_core::response::NormalizedResponse;
use folio_runtime::Orchestrator;
use serde_json::Value;
use tokio::io::AsyncReadExt;

/// Read the event from `path`, or from stdin when `None`.
pub async fn read_event(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read event file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            let _ = tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("failed to read event from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("event is not valid JSON")
}

/// Run the pipeline on `event`, write the response JSON to `out`, then wait
/// for any alert before returning.
pub async fn run(
    orchestrator: &Orchestrator,
    event: &Value,
    context: InvocationContext,
    out: &mut impl Write,
) -> Result<NormalizedResponse> {
    let dispatched = orchestrator.handle_event(event, context).await;
    let json = serde_json::to_string(&dispatched.response).context("failed to encode response")?;
    writeln!(out, "{json}").context("failed to write response")?;
    out.flush().context("failed to write response")?;

    dispatched.alert.wait().await;
    Ok(dispatched.response)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Arc;
    use std::time::Duration;

    use folio_core::context::LogLocators;
    use folio_core::ids::InvocationId;
    use folio_runtime::PipelineOptions;
    use folio_runtime::testing::{FakeChannel, FakeEngine, FakeStore};
    use serde_json::json;

    use super::*;

    fn context() -> InvocationContext {
        InvocationContext::new(
            InvocationId::from_string("req-1"),
            "folio",
            Duration::from_secs(30),
            LogLocators::default(),
        )
    }

    fn orchestrator(store: FakeStore, channel: FakeChannel) -> Orchestrator {
        Orchestrator::new(
            Arc::new(FakeEngine::new()),
            Arc::new(store),
            Arc::new(channel),
            PipelineOptions {
                ignore_https_errors: true,
                alert_topic: Some("arn:aws:sns:eu-west-3:1:alerts".into()),
            },
        )
    }

    #[tokio::test]
    async fn reads_event_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"body": {{"fileName": "a.pdf"}}}}"#).unwrap();
        let event = read_event(Some(file.path())).await.unwrap();
        assert_eq!(event["body"]["fileName"], "a.pdf");
    }

    #[tokio::test]
    async fn malformed_event_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_event(Some(file.path())).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn missing_event_file_fails() {
        let err = read_event(Some(Path::new("/nonexistent/event.json")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read event file"));
    }

    #[tokio::test]
    async fn writes_response_line() {
        let store = FakeStore::new();
        let event = json!({
            "body": {
                "fileName": "a.pdf",
                "url": "https://example.com",
                "s3Bucket": { "name": "bucket1" }
            }
        });
        let mut out = Vec::new();
        let response = run(&orchestrator(store.clone(), FakeChannel::new()), &event, context(), &mut out)
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["statusCode"], 200);
        assert_eq!(printed["body"], r#"{"url":"https://bucket1.s3.eu-west-3.amazonaws.com/a.pdf"}"#);
        assert_eq!(store.puts().len(), 1);
    }

    #[tokio::test]
    async fn waits_for_alert_before_returning() {
        let channel = FakeChannel::new().with_delay(Duration::from_millis(20));
        let event = json!({
            "body": {
                "fileName": "a.pdf",
                "url": "https://example.com",
                "s3Bucket": { "name": "bucket1" }
            }
        });
        let mut out = Vec::new();
        let response = run(
            &orchestrator(FakeStore::rejecting(403), channel.clone()),
            &event,
            context(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(response.status_code, 500);
        assert_eq!(channel.attempts().len(), 1);
    }
}
