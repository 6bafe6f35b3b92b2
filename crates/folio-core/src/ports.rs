//! Collaborator ports.
//!
//! The pipeline talks to the outside world only through these traits. Adapter
//! crates implement them (`folio-browser` for the engine, `folio-aws` for the
//! store and the notification channel); tests implement them with in-memory
//! fakes.

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::request::{Cookie, Credentials, DocumentOptions, Viewport};

// ─────────────────────────────────────────────────────────────────────────────
// Headless browser engine
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle milestones a content load waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitCondition {
    /// No network requests in flight for 500 ms.
    NetworkIdle,
    /// The `load` event fired.
    Load,
    /// The `DOMContentLoaded` event fired.
    DomContentLoaded,
}

impl WaitCondition {
    /// Every condition; content loads in the pipeline always wait for all of them.
    pub const ALL: [Self; 3] = [Self::NetworkIdle, Self::Load, Self::DomContentLoaded];
}

/// Per-launch engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Viewport applied to every page opened on the handle.
    pub viewport: Viewport,
    /// Accept invalid TLS certificates.
    pub ignore_https_errors: bool,
}

/// Errors raised by a browser engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process could not be started or connected to.
    #[error("browser failed to start: {0}")]
    Launch(String),

    /// Navigation did not complete.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// The target URL.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// A page operation failed.
    #[error("{action} failed: {reason}")]
    Action {
        /// The operation (e.g. `"printToPDF"`).
        action: String,
        /// Why it failed.
        reason: String,
    },

    /// The protocol connection reported an error.
    #[error("browser protocol error: {0}")]
    Protocol(String),

    /// The browser or page is already closed.
    #[error("browser connection closed")]
    Closed,
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser and return an exclusively-owned handle to it.
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, EngineError>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open a new blank page.
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, EngineError>;

    /// Tear the browser down. Calling it again is a no-op.
    async fn close(&self) -> Result<(), EngineError>;
}

/// One browser tab.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Bound on how long navigation and content loads may take.
    /// `None` waits indefinitely.
    fn set_navigation_timeout(&self, timeout: Option<Duration>);

    /// Install cookies before content is loaded.
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), EngineError>;

    /// Navigate to `url` and wait for every condition in `wait`.
    async fn goto(&self, url: &str, wait: &[WaitCondition]) -> Result<(), EngineError>;

    /// Replace the document with `html` and wait for every condition in `wait`.
    async fn set_content(&self, html: &str, wait: &[WaitCondition]) -> Result<(), EngineError>;

    /// Render the loaded page as a paginated document.
    async fn render_document(&self, options: &DocumentOptions) -> Result<Vec<u8>, EngineError>;

    /// Serialize the loaded DOM, doctype included.
    async fn serialize(&self) -> Result<String, EngineError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Object store
// ─────────────────────────────────────────────────────────────────────────────

/// One upload.
#[derive(Clone, Debug)]
pub struct PutObject {
    /// Target bucket.
    pub bucket: String,
    /// Bucket region.
    pub region: String,
    /// Object key.
    pub key: String,
    /// Object bytes.
    pub body: Vec<u8>,
    /// MIME type stored with the object.
    pub content_type: String,
    /// Request-scoped credentials, when the deployment allows them.
    pub credentials: Option<Credentials>,
}

/// Errors raised by an object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No usable credentials.
    #[error("object store credentials unavailable: {0}")]
    Credentials(String),

    /// The store answered with a non-success status.
    #[error("object store rejected upload ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request never got a response.
    #[error("object store unreachable: {0}")]
    Transport(String),
}

/// Stores artifact bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one object.
    async fn put_object(&self, object: PutObject) -> Result<(), StoreError>;
}

/// Pattern a bucket name must match (S3 naming rules, DNS-compatible).
pub const BUCKET_NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$";

/// Pattern a region must match.
pub const REGION_PATTERN: &str = r"^[a-z0-9-]+$";

static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BUCKET_NAME_PATTERN).expect("bucket name pattern is valid"));

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(REGION_PATTERN).expect("region pattern is valid"));

/// Whether `name` is a bucket name safe to place in a host name.
pub fn is_bucket_name(name: &str) -> bool {
    BUCKET_NAME.is_match(name) && !name.contains("..")
}

/// Whether `region` is a region code safe to place in a host name.
pub fn is_region(region: &str) -> bool {
    REGION.is_match(region)
}

/// Whether `key` has a `.` or `..` segment, which URL normalization would
/// fold into a different key.
pub fn has_dot_segment(key: &str) -> bool {
    key.split('/').any(|segment| segment == "." || segment == "..")
}

/// URI-encode an object key the way S3 does: unreserved characters and `/`
/// pass through, everything else is `%XX`-escaped byte by byte.
pub fn encode_object_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification channel
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The channel is missing required configuration (topic, credentials).
    #[error("notification channel not configured: {0}")]
    NotConfigured(String),

    /// The channel answered with a non-success status.
    #[error("notification rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request never got a response.
    #[error("notification channel unreachable: {0}")]
    Transport(String),
}

/// Publishes operator alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish `message` under `subject` to `topic`.
    async fn publish(&self, topic: &str, message: &str, subject: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_follow_s3_rules() {
        for name in ["bucket1", "my.reports-2024", "abc"] {
            assert!(is_bucket_name(name), "{name}");
        }
        for name in [
            "b",
            "Bucket",
            "attacker.example#",
            "a..b",
            "-bucket",
            "bucket-",
            "x@attacker.example/",
            "bucket/evil",
        ] {
            assert!(!is_bucket_name(name), "{name}");
        }
    }

    #[test]
    fn regions_are_plain_codes() {
        assert!(is_region("eu-west-3"));
        assert!(is_region("us-gov-west-1"));
        for region in ["x@attacker.example/", "eu-west-3.evil", "EU-WEST-3", ""] {
            assert!(!is_region(region), "{region}");
        }
    }

    #[test]
    fn dot_segments_detected() {
        assert!(has_dot_segment("../x.pdf"));
        assert!(has_dot_segment("a/./b.pdf"));
        assert!(has_dot_segment("a/.."));
        assert!(!has_dot_segment("a.pdf"));
        assert!(!has_dot_segment("reports/..hidden.pdf"));
    }

    #[test]
    fn plain_keys_pass_through() {
        assert_eq!(encode_object_key("a.pdf"), "a.pdf");
        assert_eq!(encode_object_key("reports/2024/q1.pdf"), "reports/2024/q1.pdf");
    }

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(encode_object_key("my report.pdf"), "my%20report.pdf");
        assert_eq!(encode_object_key("a+b=c.html"), "a%2Bb%3Dc.html");
    }

    #[test]
    fn multibyte_characters_escape_per_byte() {
        assert_eq!(encode_object_key("é.pdf"), "%C3%A9.pdf");
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::Navigation {
            url: "https://example.com".into(),
            reason: "net::ERR_NAME_NOT_RESOLVED".into(),
        };
        assert_eq!(
            err.to_string(),
            "navigation to https://example.com failed: net::ERR_NAME_NOT_RESOLVED"
        );
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Rejected {
            status: 403,
            body: "AccessDenied".into(),
        };
        assert_eq!(err.to_string(), "object store rejected upload (403): AccessDenied");
    }

    #[test]
    fn wait_conditions_cover_everything() {
        assert_eq!(WaitCondition::ALL.len(), 3);
        assert!(WaitCondition::ALL.contains(&WaitCondition::NetworkIdle));
    }
}
