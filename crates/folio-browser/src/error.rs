//! Browser-specific error types.

use folio_core::ports::EngineError;
use thiserror::Error;

/// Errors from the DevTools client.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch the Chrome process or reach its DevTools endpoint.
    #[error("failed to launch browser: {context}")]
    LaunchFailed {
        /// What went wrong during launch.
        context: String,
    },

    /// Chrome executable not found on the system.
    #[error("Chrome not found: install Chromium or set CHROME_PATH")]
    ChromeNotFound,

    /// Navigation to a URL failed.
    #[error("navigation failed for {url}: {reason}")]
    NavigationFailed {
        /// The URL that failed to load.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// A page action failed.
    #[error("{action} failed: {reason}")]
    ActionFailed {
        /// The action that failed (e.g. `"printToPDF"`).
        action: String,
        /// Why it failed.
        reason: String,
    },

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms: {context}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// What we were waiting for.
        context: String,
    },

    /// DevTools protocol error.
    #[error("CDP error: {0}")]
    Cdp(String),

    /// The WebSocket connection is gone.
    #[error("DevTools connection closed")]
    Closed,
}

impl From<BrowserError> for EngineError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::LaunchFailed { .. } | BrowserError::ChromeNotFound => {
                Self::Launch(err.to_string())
            }
            BrowserError::NavigationFailed { url, reason } => Self::Navigation { url, reason },
            BrowserError::ActionFailed { action, reason } => Self::Action { action, reason },
            BrowserError::Timeout { .. } | BrowserError::Cdp(_) => Self::Protocol(err.to_string()),
            BrowserError::Closed => Self::Closed,
        }
    }
}
