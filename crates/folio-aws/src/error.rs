//! AWS adapter error types.

use folio_core::ports::{NotifyError, StoreError};
use thiserror::Error;

/// Errors from signed AWS requests.
#[derive(Debug, Error)]
pub enum AwsError {
    /// No usable credentials.
    #[error("no AWS credentials: {0}")]
    Credentials(String),

    /// The configured endpoint or derived URL is malformed.
    #[error("invalid endpoint {url}: {reason}")]
    Endpoint {
        /// The URL that failed to parse.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// The service answered with a non-success status.
    #[error("AWS returned HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request never got a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<AwsError> for StoreError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Credentials(msg) => Self::Credentials(msg),
            AwsError::Rejected { status, body } => Self::Rejected { status, body },
            AwsError::Endpoint { .. } | AwsError::Transport(_) => Self::Transport(err.to_string()),
        }
    }
}

impl From<AwsError> for NotifyError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Credentials(_) | AwsError::Endpoint { .. } => Self::NotConfigured(err.to_string()),
            AwsError::Rejected { status, body } => Self::Rejected { status, body },
            AwsError::Transport(_) => Self::Transport(err.to_string()),
        }
    }
}
