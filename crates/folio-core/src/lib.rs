//! # folio-core
//!
//! Foundation types for the folio rendering service.
//!
//! - [`request`]: the immutable [`RenderRequest`] and its parts
//! - [`validate`]: defaulting and constraint checking of raw request bodies
//! - [`errors`]: the [`PipelineError`] taxonomy shared by every stage
//! - [`ports`]: traits for the browser engine, object store, and notification channel
//! - [`context`]: the host-supplied [`InvocationContext`]
//! - [`response`]: the normalized response returned to the host
//! - [`units`]: paper formats and CSS length conversion
//! - [`logging`]: `tracing` subscriber bootstrap and test capture

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod ports;
pub mod request;
pub mod response;
pub mod units;
pub mod validate;

pub use context::{InvocationContext, LogLocators};
pub use errors::{ErrorKind, PipelineError, Rule, Violation};
pub use ids::InvocationId;
pub use request::{
    ContentSource, Cookie, Credentials, Destination, Dimension, DocumentOptions, Margin,
    OutputFormat, RenderRequest, Viewport,
};
pub use response::{NormalizedResponse, PublishedArtifact, RenderResult};
pub use validate::{extract_body, validate};
