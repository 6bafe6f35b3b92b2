//! Render session: one browser handle, owned for one invocation.
//!
//! ```text
//! Uninitialized ─launch─▶ Launching ─prepare─▶ PageReady ─▶ ContentLoading ─render─▶ Rendered
//!        │                    │                    │               │                    │
//!        └────────────────────┴─────── close ──────┴───────────────┴────────────────────┴─▶ Closed
//! ```
//!
//! The session is the only owner of the handle. [`RenderSession::close`]
//! is idempotent and must run on every exit path; the orchestrator calls it
//! once the render stages settle, whatever their outcome.

use std::fmt;
use std::sync::Arc;

use folio_core::errors::{ErrorKind, PipelineError};
use folio_core::ports::{BrowserEngine, BrowserHandle, EngineError, LaunchConfig, PageHandle, WaitCondition};
use folio_core::request::{ContentSource, OutputFormat, RenderRequest};
use folio_core::response::RenderResult;

/// Lifecycle state of a [`RenderSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing acquired yet.
    Uninitialized,
    /// Browser launch attempted; the handle is held once it succeeds.
    Launching,
    /// A page is open and configured.
    PageReady,
    /// Content is being (or has been) loaded into the page.
    ContentLoading,
    /// The artifact has been produced.
    Rendered,
    /// The handle is released. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Launching => "launching",
            Self::PageReady => "page-ready",
            Self::ContentLoading => "content-loading",
            Self::Rendered => "rendered",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns one browser handle from launch to close.
pub struct RenderSession {
    engine: Arc<dyn BrowserEngine>,
    state: SessionState,
    browser: Option<Box<dyn BrowserHandle>>,
    page: Option<Box<dyn PageHandle>>,
}

impl RenderSession {
    /// A session that will launch through `engine`.
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            state: SessionState::Uninitialized,
            browser: None,
            page: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acquire the browser handle. An engine that cannot start is an
    /// [`ErrorKind::Internal`] failure.
    pub async fn launch(&mut self, config: &LaunchConfig) -> Result<(), PipelineError> {
        self.require(SessionState::Uninitialized, "launch")?;
        self.state = SessionState::Launching;
        tracing::debug!(
            width = config.viewport.width,
            height = config.viewport.height,
            "launching browser"
        );

        let browser = self
            .engine
            .launch(config)
            .await
            .map_err(|e| PipelineError::from_source(ErrorKind::Internal, "launch", &e))?;
        self.browser = Some(browser);
        Ok(())
    }

    /// Open a page, install cookies, and load the request's content.
    ///
    /// The navigation timeout is disabled; the invocation's own time budget
    /// is the only bound.
    pub async fn prepare(&mut self, request: &RenderRequest) -> Result<(), PipelineError> {
        self.require(SessionState::Launching, "prepare")?;
        let Some(browser) = self.browser.as_ref() else {
            return Err(self.out_of_order("prepare"));
        };

        let page = browser.new_page().await.map_err(render_failure("new page"))?;
        page.set_navigation_timeout(None);
        self.page = Some(page);
        self.state = SessionState::PageReady;

        let page = self.page.as_deref().ok_or_else(|| self.out_of_order("prepare"))?;
        if !request.cookies().is_empty() {
            tracing::debug!(count = request.cookies().len(), "setting cookies");
            page.set_cookies(request.cookies())
                .await
                .map_err(render_failure("set cookies"))?;
        }

        self.state = SessionState::ContentLoading;
        let page = self.page.as_deref().ok_or_else(|| self.out_of_order("prepare"))?;
        match request.content_source() {
            ContentSource::Url(url) => {
                tracing::debug!(url = %url, "navigating");
                page.goto(url, &WaitCondition::ALL)
                    .await
                    .map_err(render_failure("navigate"))?;
            }
            ContentSource::Html(html) => {
                tracing::debug!(length = html.len(), "loading inline content");
                page.set_content(html, &WaitCondition::ALL)
                    .await
                    .map_err(render_failure("set content"))?;
            }
        }
        Ok(())
    }

    /// Produce the artifact: a paginated document for PDF output, the
    /// serialized DOM for HTML output.
    pub async fn render(&mut self, request: &RenderRequest) -> Result<RenderResult, PipelineError> {
        self.require(SessionState::ContentLoading, "render")?;
        let page = self.page.as_deref().ok_or_else(|| self.out_of_order("render"))?;

        let format = request.output_format();
        let bytes = match format {
            OutputFormat::Pdf => page
                .render_document(request.document_options())
                .await
                .map_err(render_failure("render document"))?,
            OutputFormat::Html => page
                .serialize()
                .await
                .map_err(render_failure("serialize"))?
                .into_bytes(),
        };

        self.state = SessionState::Rendered;
        tracing::info!(format = format.as_str(), size = bytes.len(), "render complete");
        Ok(RenderResult {
            bytes,
            content_type: format.content_type(),
            destination_key: request.file_name().to_string(),
            destination: request.destination().clone(),
        })
    }

    /// Release the browser handle. Safe to call in any state, any number of
    /// times; only the first call does anything. Close errors are logged.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let from = self.state;
        self.state = SessionState::Closed;
        drop(self.page.take());

        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "browser close failed");
            }
        }
        tracing::debug!(from = %from, "render session closed");
    }

    fn require(&self, expected: SessionState, operation: &str) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.out_of_order(operation))
        }
    }

    fn out_of_order(&self, operation: &str) -> PipelineError {
        PipelineError::internal(format!("cannot {operation} a render session that is {}", self.state))
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            tracing::warn!(state = %self.state, "render session dropped without close");
        }
    }
}

fn render_failure(stage: &'static str) -> impl Fn(EngineError) -> PipelineError {
    move |e| PipelineError::from_source(ErrorKind::RenderFailure, stage, &e)
}
