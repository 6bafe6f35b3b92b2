//! Request validation.
//!
//! Two independent, pure steps:
//! 1. [`apply_defaults`] fills every absent field from the defaults table
//! 2. [`check_constraints`] collects every violated rule without mutating
//!
//! [`validate`] runs both and builds the typed [`RenderRequest`]. Nothing
//! here touches the browser or the network, so a bad request fails before
//! any resource is acquired.

pub mod constraints;
pub mod defaults;

pub use constraints::check_constraints;
pub use defaults::{DEFAULT_REGION, apply_defaults};

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ErrorKind, PipelineError, Rule, Violation};
use crate::request::{
    ContentSource, Cookie, Destination, DocumentOptions, OutputFormat, RenderRequest, Viewport,
};

/// Pull the request body out of a host event envelope (`{"body": ...}`).
///
/// The body may be an object or a JSON-encoded string. An absent, null, or
/// blank body is rejected, as is anything that does not decode to JSON.
pub fn extract_body(event: &Value) -> Result<Value, PipelineError> {
    match event.get("body") {
        None | Some(Value::Null) => Err(missing_body()),
        Some(Value::String(raw)) if raw.trim().is_empty() => Err(missing_body()),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            PipelineError::invalid_input(vec![Violation::new(
                "body",
                Rule::Type {
                    expected: "valid JSON".into(),
                },
            )])
            .with_trace(format!("body parse error: {e}"))
        }),
        Some(other) => Ok(other.clone()),
    }
}

fn missing_body() -> PipelineError {
    PipelineError::invalid_input(vec![Violation::new("body", Rule::Required)])
}

/// Validate a raw request body into a [`RenderRequest`].
pub fn validate(body: &Value) -> Result<RenderRequest, PipelineError> {
    let defaulted = apply_defaults(body);
    let violations = check_constraints(&defaulted);
    if !violations.is_empty() {
        return Err(PipelineError::invalid_input(violations));
    }
    build(defaulted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed construction
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    file_name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    html: Option<String>,
    cookies: Vec<Cookie>,
    output: OutputFormat,
    s3_bucket: Destination,
    default_viewport: WireViewport,
    options: DocumentOptions,
}

#[derive(Deserialize)]
struct WireViewport {
    width: f64,
    height: f64,
}

impl From<WireViewport> for Viewport {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(v: WireViewport) -> Self {
        Self {
            width: v.width.round() as u32,
            height: v.height.round() as u32,
        }
    }
}

fn build(defaulted: Value) -> Result<RenderRequest, PipelineError> {
    // Constraints already passed, so a decode failure here is a bug in the
    // constraint table rather than bad input.
    let body: Body = serde_json::from_value(defaulted).map_err(|e| {
        PipelineError::new(ErrorKind::Internal, "validated request could not be decoded")
            .with_trace(e.to_string())
    })?;

    let content_source = match (body.url, body.html) {
        (Some(url), _) if !url.is_empty() => ContentSource::Url(url),
        (_, Some(html)) => ContentSource::Html(html),
        _ => {
            return Err(PipelineError::invalid_input(vec![Violation::new(
                "html",
                Rule::Required,
            )]));
        }
    };

    Ok(RenderRequest::new(
        body.file_name,
        content_source,
        body.output,
        body.cookies,
        body.default_viewport.into(),
        body.options,
        body.s3_bucket,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn minimal_url_request() {
        let req = validate(&json!({
            "fileName": "a.pdf",
            "url": "https://example.com",
            "s3Bucket": { "name": "bucket1" }
        }))
        .unwrap();
        assert_eq!(req.file_name(), "a.pdf");
        assert_eq!(
            req.content_source(),
            &ContentSource::Url("https://example.com".into())
        );
        assert_eq!(req.output_format(), OutputFormat::Pdf);
        assert_eq!(req.viewport(), Viewport::default());
        assert_eq!(req.destination().bucket_name, "bucket1");
        assert_eq!(req.destination().region, DEFAULT_REGION);
        assert!(req.cookies().is_empty());
        assert_eq!(req.document_options(), &DocumentOptions::default());
    }

    #[test]
    fn html_request_with_options() {
        let req = validate(&json!({
            "fileName": "page.html",
            "html": "<h1>hi</h1>",
            "output": "HTML",
            "defaultViewport": { "width": 800, "height": 600 },
            "options": { "landscape": true, "margin": { "top": "1cm" } },
            "s3Bucket": { "name": "bucket1", "region": "us-west-2" }
        }))
        .unwrap();
        assert_eq!(req.content_source(), &ContentSource::Html("<h1>hi</h1>".into()));
        assert_eq!(req.output_format(), OutputFormat::Html);
        assert_eq!(req.viewport(), Viewport { width: 800, height: 600 });
        assert!(req.document_options().landscape);
        assert!(req.document_options().print_background);
        assert_eq!(req.destination().region, "us-west-2");
    }

    #[test]
    fn url_wins_when_both_present() {
        let req = validate(&json!({
            "fileName": "a.pdf",
            "url": "https://example.com",
            "html": "<p>ignored</p>",
            "s3Bucket": { "name": "bucket1" }
        }))
        .unwrap();
        assert_matches!(req.content_source(), ContentSource::Url(_));
    }

    #[test]
    fn empty_url_falls_back_to_html() {
        let req = validate(&json!({
            "fileName": "a.pdf",
            "url": "",
            "html": "<p>x</p>",
            "s3Bucket": { "name": "bucket1" }
        }))
        .unwrap();
        assert_matches!(req.content_source(), ContentSource::Html(_));
    }

    #[test]
    fn violations_are_reported_together() {
        let err = validate(&json!({ "fileName": "report.txt" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, ["fileName", "html", "s3Bucket.name"]);
    }

    #[test]
    fn extract_object_body() {
        let body = extract_body(&json!({ "body": { "fileName": "a.pdf" } })).unwrap();
        assert_eq!(body["fileName"], "a.pdf");
    }

    #[test]
    fn extract_string_body() {
        let body = extract_body(&json!({ "body": "{\"fileName\":\"a.pdf\"}" })).unwrap();
        assert_eq!(body["fileName"], "a.pdf");
    }

    #[test]
    fn missing_body_is_invalid_input() {
        for event in [json!({}), json!({ "body": null }), json!({ "body": "  " })] {
            let err = extract_body(&event).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert_eq!(err.violations(), [Violation::new("body", Rule::Required)]);
        }
    }

    #[test]
    fn malformed_body_is_invalid_input() {
        let err = extract_body(&json!({ "body": "{not json" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.trace().contains("body parse error"));
    }
}
