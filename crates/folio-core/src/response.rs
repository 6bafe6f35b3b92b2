//! Pipeline results and the normalized response handed back to the host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::Destination;

/// Bytes produced by the render step, ready for upload.
#[derive(Clone, Debug)]
pub struct RenderResult {
    /// Artifact bytes.
    pub bytes: Vec<u8>,
    /// MIME type (`application/pdf` or `text/html`).
    pub content_type: &'static str,
    /// Object key.
    pub destination_key: String,
    /// Upload destination.
    pub destination: Destination,
}

/// Where the uploaded artifact can be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    /// Public retrieval URL.
    #[serde(rename = "url")]
    pub public_url: String,
}

/// HTTP-style response in the invocation host's proxy format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    /// Status code (200, 400, 500).
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded body.
    pub body: String,
}

impl NormalizedResponse {
    /// Build a response with the standard CORS and content-type headers.
    ///
    /// `body` is JSON-encoded; a value that cannot be encoded yields `null`.
    pub fn new(status_code: u16, body: &impl Serialize) -> Self {
        let headers = BTreeMap::from([
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]);
        Self {
            status_code,
            headers,
            body: serde_json::to_string(body).unwrap_or_else(|_| "null".to_string()),
        }
    }

    /// 200 with a serialized success payload.
    pub fn ok(body: &impl Serialize) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_serializes_artifact() {
        let resp = NormalizedResponse::ok(&PublishedArtifact {
            public_url: "https://b.s3.eu-west-3.amazonaws.com/a.pdf".into(),
        });
        assert_eq!(resp.status_code, 200);
        assert!(resp.is_success());
        assert_eq!(
            resp.body,
            r#"{"url":"https://b.s3.eu-west-3.amazonaws.com/a.pdf"}"#
        );
    }

    #[test]
    fn headers_are_cors_and_json() {
        let resp = NormalizedResponse::new(400, &"bad");
        assert_eq!(resp.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(resp.headers["Content-Type"], "application/json");
        assert_eq!(resp.body, "\"bad\"");
        assert!(!resp.is_success());
    }

    #[test]
    fn proxy_wire_format() {
        let resp = NormalizedResponse::new(500, &"boom");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["body"], "\"boom\"");
    }
}
