//! In-memory fakes of the collaborator ports.
//!
//! Every fake records what it was asked to do so tests can assert on call
//! counts and arguments. Failures are injected per operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use folio_core::ports::{
    BrowserEngine, BrowserHandle, EngineError, LaunchConfig, NotificationChannel, NotifyError,
    ObjectStore, PageHandle, PutObject, StoreError, WaitCondition,
};
use folio_core::request::{Cookie, DocumentOptions};
use parking_lot::Mutex;

/// Bytes the fake engine returns for a document render.
pub const FAKE_PDF: &[u8] = b"%PDF-1.4 fake";

/// Markup the fake engine returns when serializing.
pub const FAKE_HTML: &str = "<!DOCTYPE html><html><body>fake</body></html>";

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded page operation.
#[derive(Clone, Debug, PartialEq)]
pub enum PageCall {
    /// `set_navigation_timeout`.
    NavigationTimeout(Option<Duration>),
    /// `set_cookies`.
    SetCookies(Vec<Cookie>),
    /// `goto`.
    Goto(String, Vec<WaitCondition>),
    /// `set_content`.
    SetContent(String, Vec<WaitCondition>),
    /// `render_document`.
    RenderDocument(DocumentOptions),
    /// `serialize`.
    Serialize,
}

impl PageCall {
    /// Operation name, as used by [`FakeEngine::failing_on`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::NavigationTimeout(_) => "set_navigation_timeout",
            Self::SetCookies(_) => "set_cookies",
            Self::Goto(..) => "goto",
            Self::SetContent(..) => "set_content",
            Self::RenderDocument(_) => "render_document",
            Self::Serialize => "serialize",
        }
    }
}

#[derive(Default)]
struct EngineLog {
    launches: AtomicUsize,
    closes: AtomicUsize,
    pages: AtomicUsize,
    configs: Mutex<Vec<LaunchConfig>>,
    calls: Mutex<Vec<PageCall>>,
}

/// Fake [`BrowserEngine`]. Clones share one call log.
#[derive(Clone, Default)]
pub struct FakeEngine {
    log: Arc<EngineLog>,
    fail_launch: bool,
    fail_new_page: bool,
    fail_on: Option<&'static str>,
    hang_on: Option<&'static str>,
    fail_close: bool,
}

impl FakeEngine {
    /// An engine where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `launch` fail.
    #[must_use]
    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Make `new_page` fail.
    #[must_use]
    pub fn failing_new_page(mut self) -> Self {
        self.fail_new_page = true;
        self
    }

    /// Make the page operation named `operation` fail (see [`PageCall::name`]).
    #[must_use]
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Make the page operation named `operation` never complete, like a page
    /// that never reaches network idle.
    #[must_use]
    pub fn hanging_on(mut self, operation: &'static str) -> Self {
        self.hang_on = Some(operation);
        self
    }

    /// Make `close` report an error (it still counts as a close).
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Number of `launch` calls.
    pub fn launches(&self) -> usize {
        self.log.launches.load(Ordering::SeqCst)
    }

    /// Number of `close` calls on handles from this engine.
    pub fn closes(&self) -> usize {
        self.log.closes.load(Ordering::SeqCst)
    }

    /// Number of pages opened.
    pub fn pages(&self) -> usize {
        self.log.pages.load(Ordering::SeqCst)
    }

    /// Configs passed to `launch`.
    pub fn launch_configs(&self) -> Vec<LaunchConfig> {
        self.log.configs.lock().clone()
    }

    /// Every page operation, in call order.
    pub fn calls(&self) -> Vec<PageCall> {
        self.log.calls.lock().clone()
    }

    /// Names of every page operation, in call order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.log.calls.lock().iter().map(PageCall::name).collect()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, EngineError> {
        let _ = self.log.launches.fetch_add(1, Ordering::SeqCst);
        self.log.configs.lock().push(config.clone());
        if self.fail_launch {
            return Err(EngineError::Launch("chrome exited early with status 3".into()));
        }
        Ok(Box::new(FakeBrowser {
            engine: self.clone(),
        }))
    }
}

struct FakeBrowser {
    engine: FakeEngine,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, EngineError> {
        if self.engine.fail_new_page {
            return Err(EngineError::Protocol("Target.createTarget failed".into()));
        }
        let _ = self.engine.log.pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            engine: self.engine.clone(),
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        let _ = self.engine.log.closes.fetch_add(1, Ordering::SeqCst);
        if self.engine.fail_close {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

struct FakePage {
    engine: FakeEngine,
}

impl FakePage {
    fn record(&self, call: PageCall) -> Result<(), EngineError> {
        let name = call.name();
        self.engine.log.calls.lock().push(call);
        if self.engine.fail_on == Some(name) {
            return Err(EngineError::Action {
                action: name.to_string(),
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }

    async fn act(&self, call: PageCall) -> Result<(), EngineError> {
        if self.engine.hang_on == Some(call.name()) {
            self.engine.log.calls.lock().push(call);
            return std::future::pending().await;
        }
        self.record(call)
    }
}

#[async_trait]
impl PageHandle for FakePage {
    fn set_navigation_timeout(&self, timeout: Option<Duration>) {
        let _ = self.record(PageCall::NavigationTimeout(timeout));
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), EngineError> {
        self.act(PageCall::SetCookies(cookies.to_vec())).await
    }

    async fn goto(&self, url: &str, wait: &[WaitCondition]) -> Result<(), EngineError> {
        self.act(PageCall::Goto(url.to_string(), wait.to_vec()))
            .await
            .map_err(|_| EngineError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            })
    }

    async fn set_content(&self, html: &str, wait: &[WaitCondition]) -> Result<(), EngineError> {
        self.act(PageCall::SetContent(html.to_string(), wait.to_vec())).await
    }

    async fn render_document(&self, options: &DocumentOptions) -> Result<Vec<u8>, EngineError> {
        self.act(PageCall::RenderDocument(options.clone())).await?;
        Ok(FAKE_PDF.to_vec())
    }

    async fn serialize(&self) -> Result<String, EngineError> {
        self.act(PageCall::Serialize).await?;
        Ok(FAKE_HTML.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object store
// ─────────────────────────────────────────────────────────────────────────────

/// Fake [`ObjectStore`] keeping uploads in memory.
#[derive(Clone, Default)]
pub struct FakeStore {
    puts: Arc<Mutex<Vec<PutObject>>>,
    reject_with: Option<u16>,
}

impl FakeStore {
    /// A store that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every upload with `status`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            puts: Arc::default(),
            reject_with: Some(status),
        }
    }

    /// Every upload attempt, accepted or not.
    pub fn puts(&self) -> Vec<PutObject> {
        self.puts.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put_object(&self, object: PutObject) -> Result<(), StoreError> {
        self.puts.lock().push(object);
        match self.reject_with {
            Some(status) => Err(StoreError::Rejected {
                status,
                body: "<Error><Code>AccessDenied</Code></Error>".into(),
            }),
            None => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification channel
// ─────────────────────────────────────────────────────────────────────────────

/// One published notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Topic.
    pub topic: String,
    /// Message body.
    pub message: String,
    /// Subject line.
    pub subject: String,
}

/// Fake [`NotificationChannel`].
#[derive(Clone, Default)]
pub struct FakeChannel {
    attempts: Arc<Mutex<Vec<Published>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl FakeChannel {
    /// A channel that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every publish fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sleep for `delay` before acknowledging.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every publish attempt, failed ones included.
    pub fn attempts(&self) -> Vec<Published> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for FakeChannel {
    async fn publish(&self, topic: &str, message: &str, subject: &str) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.attempts.lock().push(Published {
            topic: topic.to_string(),
            message: message.to_string(),
            subject: subject.to_string(),
        });
        if self.fail {
            return Err(NotifyError::Transport("connection refused".into()));
        }
        Ok(())
    }
}
