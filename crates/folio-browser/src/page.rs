//! One browser tab driven over its own DevTools connection.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use folio_core::ports::{EngineError, PageHandle, WaitCondition};
use folio_core::request::{Cookie, Dimension, DocumentOptions, Viewport};
use folio_core::units;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::connection::{CdpConnection, CdpEvent, bounded};
use crate::error::BrowserError;

/// Command and navigation timeout until the caller changes it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Quiet period after which the network counts as idle.
const NETWORK_IDLE: Duration = Duration::from_millis(500);

/// Letter, the print default when neither a format nor a size is given.
const DEFAULT_PAPER: (f64, f64) = (8.5, 11.0);

/// Resolves once the document has finished loading.
const READY_STATE_JS: &str = r"new Promise(resolve => {
    if (document.readyState === 'complete') return resolve(true);
    window.addEventListener('load', () => resolve(true), { once: true });
})";

/// Doctype plus the serialized document element.
const SERIALIZE_JS: &str = r"(() => {
    let html = '';
    if (document.doctype) html = new XMLSerializer().serializeToString(document.doctype);
    if (document.documentElement) html += document.documentElement.outerHTML;
    return html;
})()";

/// A page target.
pub struct CdpPage {
    conn: CdpConnection,
    timeout: parking_lot::Mutex<Option<Duration>>,
}

impl CdpPage {
    /// Enable the domains the pipeline listens to and apply the viewport.
    pub async fn open(conn: CdpConnection, viewport: Viewport) -> Result<Self, BrowserError> {
        let page = Self {
            conn,
            timeout: parking_lot::Mutex::new(Some(DEFAULT_TIMEOUT)),
        };
        let _ = page.call("Page.enable", json!({})).await?;
        let _ = page.call("Network.enable", json!({})).await?;
        let _ = page
            .call(
                "Emulation.setDeviceMetricsOverride",
                json!({
                    "width": viewport.width,
                    "height": viewport.height,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                }),
            )
            .await?;
        Ok(page)
    }

    fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock()
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.conn.send(method, params, self.timeout()).await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let msg = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("evaluation error");
            return Err(BrowserError::ActionFailed {
                action: "evaluate".into(),
                reason: msg.into(),
            });
        }
        Ok(result["result"]["value"].clone())
    }

    async fn navigate(&self, url: &str, wait: &[WaitCondition]) -> Result<(), BrowserError> {
        let mut events = self.conn.subscribe();
        let mut watcher = LoadWatcher::new(wait, Instant::now());

        let nav = self
            .call("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.into(),
                reason: e.to_string(),
            })?;
        if let Some(error_text) = nav["errorText"].as_str().filter(|t| !t.is_empty()) {
            return Err(BrowserError::NavigationFailed {
                url: url.into(),
                reason: error_text.into(),
            });
        }

        bounded(
            self.timeout(),
            format!("navigation to {url}"),
            settle(&mut events, &mut watcher),
        )
        .await
    }

    async fn load_content(&self, html: &str, wait: &[WaitCondition]) -> Result<(), BrowserError> {
        let mut events = self.conn.subscribe();
        let mut watcher = LoadWatcher::new(wait, Instant::now());

        let markup = serde_json::to_string(html).map_err(|e| BrowserError::ActionFailed {
            action: "setContent".into(),
            reason: e.to_string(),
        })?;
        let _ = self
            .evaluate(&format!(
                "(() => {{ document.open(); document.write({markup}); document.close(); }})()"
            ))
            .await?;

        if watcher.needs_document() {
            let _ = self.evaluate(READY_STATE_JS).await?;
            watcher.document_ready();
        }

        bounded(
            self.timeout(),
            "content load".to_string(),
            settle(&mut events, &mut watcher),
        )
        .await
    }

    async fn print_to_pdf(&self, options: &DocumentOptions) -> Result<Vec<u8>, BrowserError> {
        let params = print_params(options)?;
        let result = self.call("Page.printToPDF", params).await?;
        let b64 = result["data"].as_str().ok_or_else(|| BrowserError::ActionFailed {
            action: "printToPDF".into(),
            reason: "no data".into(),
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| BrowserError::ActionFailed {
                action: "printToPDF".into(),
                reason: format!("base64 decode: {e}"),
            })
    }
}

#[async_trait]
impl PageHandle for CdpPage {
    fn set_navigation_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock() = timeout;
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), EngineError> {
        if cookies.is_empty() {
            return Ok(());
        }
        let cookies = serde_json::to_value(cookies).map_err(|e| BrowserError::ActionFailed {
            action: "setCookies".into(),
            reason: e.to_string(),
        })?;
        let _ = self
            .call("Network.setCookies", json!({ "cookies": cookies }))
            .await?;
        Ok(())
    }

    async fn goto(&self, url: &str, wait: &[WaitCondition]) -> Result<(), EngineError> {
        tracing::debug!(url, "navigating");
        self.navigate(url, wait).await.map_err(|e| match e {
            e @ BrowserError::NavigationFailed { .. } => e.into(),
            other => EngineError::Navigation {
                url: url.into(),
                reason: other.to_string(),
            },
        })
    }

    async fn set_content(&self, html: &str, wait: &[WaitCondition]) -> Result<(), EngineError> {
        tracing::debug!(bytes = html.len(), "loading inline content");
        Ok(self.load_content(html, wait).await?)
    }

    async fn render_document(&self, options: &DocumentOptions) -> Result<Vec<u8>, EngineError> {
        Ok(self.print_to_pdf(options).await?)
    }

    async fn serialize(&self) -> Result<String, EngineError> {
        let value = self.evaluate(SERIALIZE_JS).await?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            BrowserError::ActionFailed {
                action: "serialize".into(),
                reason: "document did not serialize to a string".into(),
            }
            .into()
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks lifecycle events and in-flight requests until every requested
/// [`WaitCondition`] holds.
#[derive(Debug)]
struct LoadWatcher {
    need_dom: bool,
    need_load: bool,
    need_idle: bool,
    dom: bool,
    load: bool,
    inflight: HashSet<String>,
    quiet_since: Option<Instant>,
}

impl LoadWatcher {
    fn new(wait: &[WaitCondition], now: Instant) -> Self {
        Self {
            need_dom: wait.contains(&WaitCondition::DomContentLoaded),
            need_load: wait.contains(&WaitCondition::Load),
            need_idle: wait.contains(&WaitCondition::NetworkIdle),
            dom: false,
            load: false,
            inflight: HashSet::new(),
            quiet_since: Some(now),
        }
    }

    fn needs_document(&self) -> bool {
        self.need_dom || self.need_load
    }

    fn document_ready(&mut self) {
        self.dom = true;
        self.load = true;
    }

    fn observe(&mut self, event: &CdpEvent, now: Instant) {
        match event.method.as_str() {
            "Page.domContentEventFired" => self.dom = true,
            "Page.loadEventFired" => self.load = true,
            "Network.requestWillBeSent" => {
                if let Some(id) = event.params["requestId"].as_str() {
                    let _ = self.inflight.insert(id.to_string());
                    self.quiet_since = None;
                }
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if let Some(id) = event.params["requestId"].as_str() {
                    if self.inflight.remove(id) && self.inflight.is_empty() {
                        self.quiet_since = Some(now);
                    }
                }
            }
            _ => {}
        }
    }

    /// Forget in-flight requests after missed events.
    fn reset_network(&mut self, now: Instant) {
        self.inflight.clear();
        self.quiet_since = Some(now);
    }

    /// When the network will have been quiet long enough, if it is quiet now.
    fn idle_deadline(&self) -> Option<Instant> {
        if !self.need_idle {
            return None;
        }
        self.quiet_since.map(|since| since + NETWORK_IDLE)
    }

    fn is_settled(&self, now: Instant) -> bool {
        let dom = !self.need_dom || self.dom;
        let load = !self.need_load || self.load;
        let idle = !self.need_idle || self.idle_deadline().is_some_and(|d| now >= d);
        dom && load && idle
    }
}

async fn settle(
    events: &mut broadcast::Receiver<CdpEvent>,
    watcher: &mut LoadWatcher,
) -> Result<(), BrowserError> {
    loop {
        if watcher.is_settled(Instant::now()) {
            return Ok(());
        }
        let deadline = watcher.idle_deadline();
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => watcher.observe(&event, Instant::now()),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "DevTools events lagged, resetting network tracking");
                    watcher.reset_network(Instant::now());
                }
                Err(RecvError::Closed) => return Err(BrowserError::Closed),
            },
            () = sleep_until(deadline) => {}
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Print parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Map document options onto `Page.printToPDF` parameters.
///
/// A non-empty `format` wins over `width`/`height`; lengths are converted to
/// inches; absent margins are zero.
fn print_params(options: &DocumentOptions) -> Result<Value, BrowserError> {
    let (paper_width, paper_height) = if options.format.is_empty() {
        (
            length(options.width.as_ref(), "width")?.unwrap_or(DEFAULT_PAPER.0),
            length(options.height.as_ref(), "height")?.unwrap_or(DEFAULT_PAPER.1),
        )
    } else {
        units::paper_size(&options.format).ok_or_else(|| BrowserError::ActionFailed {
            action: "printToPDF".into(),
            reason: format!("unknown paper format: {}", options.format),
        })?
    };
    let margin = &options.margin;

    Ok(json!({
        "landscape": options.landscape,
        "displayHeaderFooter": options.display_header_footer,
        "printBackground": options.print_background,
        "scale": options.scale.unwrap_or(1.0),
        "paperWidth": paper_width,
        "paperHeight": paper_height,
        "marginTop": length(margin.top.as_ref(), "margin.top")?.unwrap_or(0.0),
        "marginRight": length(margin.right.as_ref(), "margin.right")?.unwrap_or(0.0),
        "marginBottom": length(margin.bottom.as_ref(), "margin.bottom")?.unwrap_or(0.0),
        "marginLeft": length(margin.left.as_ref(), "margin.left")?.unwrap_or(0.0),
        "pageRanges": options.page_ranges,
        "headerTemplate": options.header_template.as_deref().unwrap_or_default(),
        "footerTemplate": options.footer_template.as_deref().unwrap_or_default(),
        "preferCSSPageSize": options.prefer_css_page_size,
        "transferMode": "ReturnAsBase64",
    }))
}

fn length(dimension: Option<&Dimension>, field: &str) -> Result<Option<f64>, BrowserError> {
    dimension
        .map(|d| {
            units::to_inches(d).ok_or_else(|| BrowserError::ActionFailed {
                action: "printToPDF".into(),
                reason: format!("unsupported length for {field}: {d:?}"),
            })
        })
        .transpose()
}
