//! Chrome process management and the [`BrowserEngine`] implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folio_core::ports::{BrowserEngine, BrowserHandle, EngineError, LaunchConfig, PageHandle};
use folio_core::request::Viewport;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::chrome::find_chrome;
use crate::connection::CdpConnection;
use crate::error::BrowserError;
use crate::page::CdpPage;

/// Delay between DevTools readiness probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Flags every launch gets, tuned for constrained serverless sandboxes.
const BASE_ARGS: &[&str] = &[
    "--headless",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--single-process",
    "--no-zygote",
    "--no-first-run",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Process-level launch options.
#[derive(Clone, Debug)]
pub struct BrowserOptions {
    /// Explicit Chrome binary; discovered when `None`.
    pub chrome_path: Option<PathBuf>,
    /// Extra flags appended after the defaults.
    pub extra_args: Vec<String>,
    /// Forward Chrome's stderr to `tracing` at debug level.
    pub dumpio: bool,
    /// How long to wait for the DevTools endpoint.
    pub launch_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_args: Vec::new(),
            dumpio: true,
            launch_timeout: Duration::from_secs(10),
        }
    }
}

/// Launches headless Chrome. At most one browser is alive per engine: a
/// launch waits until the previous handle is closed or dropped.
pub struct CdpEngine {
    options: BrowserOptions,
    slot: Arc<Semaphore>,
}

impl CdpEngine {
    /// Create an engine.
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    async fn spawn(
        &self,
        config: &LaunchConfig,
        permit: OwnedSemaphorePermit,
    ) -> Result<CdpBrowser, BrowserError> {
        let chrome = find_chrome(self.options.chrome_path.as_deref()).ok_or(BrowserError::ChromeNotFound)?;
        let port = free_port()?;
        let user_data_dir = std::env::temp_dir().join(format!("folio-chrome-{port}"));
        let args = launch_args(port, &user_data_dir, config, &self.options.extra_args);

        let mut child = Command::new(&chrome)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if self.options.dumpio {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("{}: {e}", chrome.display()),
            })?;

        if let Some(stderr) = child.stderr.take() {
            let _ = tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "folio_browser::chrome", "{line}");
                }
            });
        }

        let devtools = DevTools::new(format!("http://127.0.0.1:{port}"));
        let version = wait_until_ready(&devtools, &mut child, self.options.launch_timeout).await?;
        tracing::info!(
            chrome = %chrome.display(),
            port,
            product = version["Browser"].as_str().unwrap_or("unknown"),
            "browser launched"
        );

        Ok(CdpBrowser {
            devtools,
            viewport: config.viewport,
            user_data_dir,
            process: tokio::sync::Mutex::new(Some(child)),
            permit: parking_lot::Mutex::new(Some(permit)),
        })
    }
}

#[async_trait]
impl BrowserEngine for CdpEngine {
    async fn launch(&self, config: &LaunchConfig) -> Result<Box<dyn BrowserHandle>, EngineError> {
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::LaunchFailed {
                context: "engine shut down".into(),
            })?;
        let browser = self.spawn(config, permit).await?;
        Ok(Box::new(browser))
    }
}

/// A running Chrome process.
pub struct CdpBrowser {
    devtools: DevTools,
    viewport: Viewport,
    user_data_dir: PathBuf,
    process: tokio::sync::Mutex<Option<Child>>,
    permit: parking_lot::Mutex<Option<OwnedSemaphorePermit>>,
}

#[async_trait]
impl BrowserHandle for CdpBrowser {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, EngineError> {
        if self.process.lock().await.is_none() {
            return Err(EngineError::Closed);
        }
        let ws_url = self.devtools.new_target("about:blank").await?;
        let conn = CdpConnection::connect(&ws_url).await?;
        let page = CdpPage::open(conn, self.viewport).await?;
        Ok(Box::new(page))
    }

    async fn close(&self) -> Result<(), EngineError> {
        let Some(mut child) = self.process.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "failed to kill browser process");
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            tracing::debug!(error = %e, "browser profile cleanup skipped");
        }
        drop(self.permit.lock().take());
        tracing::debug!("browser closed");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DevTools HTTP endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// The `/json/*` HTTP surface of a DevTools server.
pub(crate) struct DevTools {
    base_url: String,
    http: reqwest::Client,
}

impl DevTools {
    pub(crate) fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// `GET /json/version`.
    pub(crate) async fn version(&self) -> Result<Value, BrowserError> {
        let resp = self
            .http
            .get(format!("{}/json/version", self.base_url))
            .send()
            .await
            .map_err(|e| BrowserError::Cdp(format!("/json/version: {e}")))?;
        resp.error_for_status()
            .map_err(|e| BrowserError::Cdp(format!("/json/version: {e}")))?
            .json()
            .await
            .map_err(|e| BrowserError::Cdp(format!("/json/version: {e}")))
    }

    /// `PUT /json/new?{url}`; returns the target's WebSocket URL.
    pub(crate) async fn new_target(&self, url: &str) -> Result<String, BrowserError> {
        let failed = |reason: String| BrowserError::ActionFailed {
            action: "newPage".into(),
            reason,
        };
        let resp = self
            .http
            .put(format!("{}/json/new?{url}", self.base_url))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {body}")));
        }
        let target: Value = resp.json().await.map_err(|e| failed(e.to_string()))?;
        target["webSocketDebuggerUrl"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| failed("no webSocketDebuggerUrl in response".into()))
    }
}

async fn wait_until_ready(
    devtools: &DevTools,
    child: &mut Child,
    timeout: Duration,
) -> Result<Value, BrowserError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait().map_err(|e| BrowserError::LaunchFailed {
            context: format!("wait: {e}"),
        })? {
            return Err(BrowserError::LaunchFailed {
                context: format!("Chrome exited early with {status}"),
            });
        }

        if let Ok(version) = devtools.version().await {
            return Ok(version);
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(BrowserError::LaunchFailed {
                context: format!(
                    "DevTools endpoint {} not ready within {}ms",
                    devtools.base_url,
                    timeout.as_millis()
                ),
            });
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
}

fn free_port() -> Result<u16, BrowserError> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").map_err(|e| BrowserError::LaunchFailed {
        context: format!("bind port: {e}"),
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| BrowserError::LaunchFailed {
            context: format!("local_addr: {e}"),
        })?
        .port();
    Ok(port)
}

/// Full command line for one launch.
fn launch_args(port: u16, user_data_dir: &Path, config: &LaunchConfig, extra: &[String]) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(|a| (*a).to_string()).collect();
    args.push(format!("--remote-debugging-port={port}"));
    args.push(format!("--user-data-dir={}", user_data_dir.display()));
    args.push(format!(
        "--window-size={},{}",
        config.viewport.width, config.viewport.height
    ));
    if config.ignore_https_errors {
        args.push("--ignore-certificate-errors".to_string());
    }
    args.extend(extra.iter().cloned());
    args.push("about:blank".to_string());
    args
}


#[cfg(test)]
#[cfg(feature = "browser-integration")]
mod integration_tests {
    use folio_core::ports::WaitCondition;
    use folio_core::request::DocumentOptions;

    use super::*;

    fn engine() -> CdpEngine {
        CdpEngine::new(BrowserOptions::default())
    }

    fn config() -> LaunchConfig {
        LaunchConfig {
            viewport: Viewport::default(),
            ignore_https_errors: true,
        }
    }

    #[tokio::test]
    async fn renders_inline_html_to_pdf() {
        let browser = engine().launch(&config()).await.unwrap();
        let page = browser.new_page().await.unwrap();
        page.set_navigation_timeout(None);
        page.set_content("<h1>Hello</h1>", &WaitCondition::ALL).await.unwrap();

        let pdf = page.render_document(&DocumentOptions::default()).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        browser.close().await.unwrap();
        browser.close().await.unwrap();
    }

    #[tokio::test]
    async fn serializes_loaded_document() {
        let browser = engine().launch(&config()).await.unwrap();
        let page = browser.new_page().await.unwrap();
        page.set_content("<!DOCTYPE html><p id=\"t\">content</p>", &WaitCondition::ALL)
            .await
            .unwrap();

        let html = page.serialize().await.unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p id=\"t\">content</p>"));
        browser.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_launch_waits_for_first_close() {
        let engine = Arc::new(engine());
        let first = engine.launch(&config()).await.unwrap();

        let pending = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.launch(&config()).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!pending.is_finished());

        first.close().await.unwrap();
        pending.await.unwrap().unwrap();
    }
}
