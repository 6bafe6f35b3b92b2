//! Pipeline error taxonomy.
//!
//! Every stage fails with a [`PipelineError`] carrying a stable [`ErrorKind`],
//! a human-readable message, and an internal diagnostic trace. Only the kind
//! (through its status code) and the message ever reach the caller; the trace
//! is reserved for logs and alerts.

use std::error::Error as StdError;
use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ErrorKind
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a pipeline failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Schema or defaulting violation, missing field, bad conditional, bad extension.
    InvalidInput,
    /// Engine fault during page setup, navigation, or render.
    RenderFailure,
    /// The object store rejected the upload.
    PublishFailure,
    /// Uninitialized context, missing configuration, or an unclassified fault.
    Internal,
}

impl ErrorKind {
    /// Status code exposed to the caller.
    pub fn status_code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::RenderFailure | Self::PublishFailure | Self::Internal => 500,
        }
    }

    /// Whether this kind is a server-class failure (and so triggers an alert).
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.status_code())
    }

    /// Stable machine-readable code, used in alert payloads.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalidParameter",
            Self::RenderFailure => "renderFailure",
            Self::PublishFailure => "publishFailure",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation violations
// ─────────────────────────────────────────────────────────────────────────────

/// A constraint a request field can violate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum Rule {
    /// The field must be present.
    Required,
    /// The field must be present and not empty.
    NonEmpty,
    /// The field has the wrong JSON type.
    Type {
        /// Expected type description (e.g. `"string"`).
        expected: String,
    },
    /// The field must match a regular expression.
    Pattern {
        /// The pattern, as written in the rule.
        pattern: String,
    },
    /// The field must be one of a fixed set of values.
    OneOf {
        /// The allowed values.
        allowed: Vec<String>,
    },
    /// The field must be an absolute URI.
    Uri,
    /// The URI uses a scheme outside the allowed set.
    Scheme {
        /// The allowed schemes.
        allowed: Vec<String>,
    },
    /// A key has a `.` or `..` path segment.
    DotSegment,
    /// The numeric field must be strictly positive.
    Positive,
    /// The numeric field must lie within an inclusive range.
    Range {
        /// Inclusive lower bound.
        min: String,
        /// Inclusive upper bound.
        max: String,
    },
    /// A length string uses an unsupported CSS unit.
    Unit,
    /// A cookie needs a `domain` or a `url` to be scoped.
    CookieScope,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("is required"),
            Self::NonEmpty => f.write_str("must not be empty"),
            Self::Type { expected } => write!(f, "must be {expected}"),
            Self::Pattern { pattern } => write!(f, "must match pattern \"{pattern}\""),
            Self::OneOf { allowed } => write!(f, "must be one of {}", allowed.join(", ")),
            Self::Uri => f.write_str("must be an absolute URI"),
            Self::Scheme { allowed } => write!(f, "must use one of the schemes {}", allowed.join(", ")),
            Self::DotSegment => f.write_str("must not contain . or .. path segments"),
            Self::Positive => f.write_str("must be greater than 0"),
            Self::Range { min, max } => write!(f, "must be between {min} and {max}"),
            Self::Unit => f.write_str("must use one of the units px, in, cm, mm"),
            Self::CookieScope => f.write_str("must have a domain or a url"),
        }
    }
}

/// One violated constraint: the offending field path and the rule it broke.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted field path, e.g. `s3Bucket.name` or `cookies[0].value`.
    pub path: String,
    /// The violated rule.
    #[serde(flatten)]
    pub rule: Rule,
}

impl Violation {
    /// Create a violation for `path`.
    pub fn new(path: impl Into<String>, rule: Rule) -> Self {
        Self {
            path: path.into(),
            rule,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.rule)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PipelineError
// ─────────────────────────────────────────────────────────────────────────────

/// The single error type flowing out of every pipeline stage.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    violations: Vec<Violation>,
    trace: String,
}

impl PipelineError {
    /// Create an error with an empty diagnostic trace.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            violations: Vec::new(),
            trace: String::new(),
        }
    }

    /// Validation failure listing every violated constraint.
    pub fn invalid_input(violations: Vec<Violation>) -> Self {
        let message = if violations.is_empty() {
            "invalid request".to_string()
        } else {
            violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        Self {
            kind: ErrorKind::InvalidInput,
            message,
            violations,
            trace: String::new(),
        }
    }

    /// Internal failure with a plain message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Classify a collaborator error under `kind`, recording where it happened.
    ///
    /// The message is the error's display text; the trace records the stage
    /// and the full `source()` chain.
    pub fn from_source(kind: ErrorKind, stage: &str, err: &(dyn StdError + 'static)) -> Self {
        let mut trace = format!("stage: {stage}\nerror: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\ncaused by: {cause}");
            source = cause.source();
        }
        Self {
            kind,
            message: err.to_string(),
            violations: Vec::new(),
            trace,
        }
    }

    /// Append a line to the diagnostic trace.
    #[must_use]
    pub fn with_trace(mut self, line: impl AsRef<str>) -> Self {
        if !self.trace.is_empty() {
            self.trace.push('\n');
        }
        self.trace.push_str(line.as_ref());
        self
    }

    /// The error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message, safe to expose to the caller.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Violated constraints (only populated for [`ErrorKind::InvalidInput`]).
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Internal diagnostic trace. Never part of the response body.
    pub fn trace(&self) -> &str {
        &self.trace
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner cause")]
    struct Inner;

    #[test]
    fn invalid_input_is_400() {
        assert_eq!(ErrorKind::InvalidInput.status_code(), 400);
        assert!(!ErrorKind::InvalidInput.is_server_error());
    }

    #[test]
    fn other_kinds_are_500() {
        for kind in [
            ErrorKind::RenderFailure,
            ErrorKind::PublishFailure,
            ErrorKind::Internal,
        ] {
            assert_eq!(kind.status_code(), 500);
            assert!(kind.is_server_error());
        }
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::InvalidInput.code(), "invalidParameter");
        assert_eq!(ErrorKind::Internal.to_string(), "internal");
    }

    #[test]
    fn invalid_input_joins_every_violation() {
        let err = PipelineError::invalid_input(vec![
            Violation::new("fileName", Rule::Required),
            Violation::new("s3Bucket.name", Rule::Required),
        ]);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.violations().len(), 2);
        assert_eq!(err.message(), "fileName is required; s3Bucket.name is required");
    }

    #[test]
    fn from_source_records_cause_chain() {
        let err = PipelineError::from_source(ErrorKind::PublishFailure, "publish", &Outer(Inner));
        assert_eq!(err.message(), "outer failure");
        assert!(err.trace().contains("stage: publish"));
        assert!(err.trace().contains("caused by: inner cause"));
    }

    #[test]
    fn trace_is_not_in_display() {
        let err = PipelineError::internal("boom").with_trace("secret detail");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.trace(), "secret detail");
    }

    #[test]
    fn rule_display() {
        let rule = Rule::OneOf {
            allowed: vec!["PDF".into(), "HTML".into()],
        };
        assert_eq!(rule.to_string(), "must be one of PDF, HTML");
        assert_eq!(Rule::Uri.to_string(), "must be an absolute URI");
    }

    #[test]
    fn violation_serializes_flat() {
        let v = Violation::new(
            "output",
            Rule::Type {
                expected: "string".into(),
            },
        );
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["path"], "output");
        assert_eq!(json["rule"], "type");
        assert_eq!(json["expected"], "string");
    }
}
