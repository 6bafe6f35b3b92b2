//! # folio-runtime
//!
//! The request-processing pipeline.
//!
//! - **`RenderSession`**: launch, page setup, content load, render, guaranteed close
//! - **`ArtifactPublisher`**: upload and public URL
//! - **`ResponseDispatcher`**: outcome to normalized response, alerting on 5xx
//! - **`Orchestrator`**: validate, render, publish, dispatch; one invocation at a time

#![deny(unsafe_code)]

pub mod alert;
pub mod dispatcher;
pub mod orchestrator;
pub mod publisher;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use alert::{ALERT_SUBJECT, Alerter, format_alert};
pub use dispatcher::{Dispatched, PendingAlert, ResponseDispatcher};
pub use orchestrator::{Orchestrator, PipelineOptions};
pub use publisher::{ArtifactPublisher, public_url};
pub use session::{RenderSession, SessionState};
