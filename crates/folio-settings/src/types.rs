//! Settings sections.
//!
//! Every struct is `camelCase` on the wire and fully defaulted, so a settings
//! file only needs the keys it changes.

use std::time::Duration;

use folio_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolioSettings {
    /// Headless browser launch.
    pub browser: BrowserSettings,
    /// Object store and alert channel.
    pub aws: AwsSettings,
    /// Invocation metadata supplied by the host.
    pub invocation: InvocationSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Local HTTP host (`folio serve`).
    pub server: ServerSettings,
}

/// Headless browser launch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// Explicit Chrome binary. Discovered automatically when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
    /// Extra command-line flags appended to the launch.
    pub extra_args: Vec<String>,
    /// Accept invalid TLS certificates.
    pub ignore_https_errors: bool,
    /// Forward Chrome's stderr to the log.
    pub dumpio: bool,
    /// How long to wait for the DevTools endpoint after spawning.
    pub launch_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_args: Vec::new(),
            ignore_https_errors: true,
            dumpio: true,
            launch_timeout_ms: 10_000,
        }
    }
}

impl BrowserSettings {
    /// Launch timeout as a [`Duration`].
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }
}

/// Object store and notification settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsSettings {
    /// Endpoint override for S3 and SNS (local emulators, tests).
    /// Switches S3 to path-style addressing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Sign uploads with credentials carried in the request body.
    pub use_request_credentials: bool,
    /// SNS topic receiving server-error alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_topic_arn: Option<String>,
}

/// Invocation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationSettings {
    /// Deployed function name.
    pub function_name: String,
    /// Log group the host writes to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_group_name: Option<String>,
    /// Log stream the host writes to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_stream_name: Option<String>,
    /// Per-invocation time budget.
    pub time_budget_ms: u64,
}

impl Default for InvocationSettings {
    fn default() -> Self {
        Self {
            function_name: "folio".to_string(),
            log_group_name: None,
            log_stream_name: None,
            time_budget_ms: 300_000,
        }
    }
}

impl InvocationSettings {
    /// Time budget as a [`Duration`].
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Local HTTP host settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
