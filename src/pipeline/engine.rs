//! Rendering engine seam and its headless Chromium implementation.
//!
//! The paginator only talks to [`RenderEngine`] / [`RenderSession`]; the
//! Chromium specifics (process launch, CDP handler loop, print parameters)
//! stay in this file.

use super::layout::PageLayout;
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Starts isolated browser instances.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Start a fresh instance with one blank page.
    async fn launch(&self) -> Result<Box<dyn RenderSession>, GenerateError>;
}

/// One running instance. Callers must finish with [`RenderSession::close`].
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Navigate and wait for the `load` event.
    async fn open(&self, url: &str) -> Result<(), GenerateError>;

    async fn scroll_to_bottom(&self) -> Result<(), GenerateError>;

    /// Whether every `<img>` whose source contains `host_pattern` has
    /// finished loading with non-zero natural dimensions.
    async fn images_ready(&self, host_pattern: &str) -> Result<bool, GenerateError>;

    async fn print_pdf(&self, layout: &PageLayout) -> Result<Vec<u8>, GenerateError>;

    /// Release the instance. Never fails; problems are only logged.
    async fn close(self: Box<Self>);
}

/// Browser-side predicate; `pattern` is substituted as a JSON string literal.
fn images_ready_script(host_pattern: &str) -> String {
    let pattern = serde_json::Value::String(host_pattern.to_string());
    format!(
        "Array.from(document.images)\
         .filter(img => img.src.includes({pattern}))\
         .every(img => img.complete && img.naturalWidth > 0 && img.naturalHeight > 0)"
    )
}

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight); true";

// ── Chromium ─────────────────────────────────────────────────────────────

/// Headless Chromium driven over the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
    launch_timeout: Option<Duration>,
}

impl ChromiumEngine {
    /// `executable: None` resolves the browser through `chrome-auto`.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            launch_timeout: None,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            executable: config.chrome_executable.clone(),
            launch_timeout: Some(config.load_timeout()),
        }
    }

    fn executable(&self) -> Result<PathBuf, GenerateError> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => chrome_auto::locate_chrome().map_err(|e| GenerateError::BrowserLaunch(e.to_string())),
        }
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, GenerateError> {
        let executable = self.executable()?;
        let profile = tempfile::Builder::new()
            .prefix("facesheet-chrome-")
            .tempdir()
            .map_err(|e| GenerateError::BrowserLaunch(format!("profile directory: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(profile.path())
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars");
        if let Some(timeout) = self.launch_timeout {
            builder = builder.launch_timeout(timeout).request_timeout(timeout);
        }
        let browser_config = builder.build().map_err(GenerateError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| GenerateError::BrowserLaunch(e.to_string()))?;
        info!(executable = %executable.display(), "browser launched");

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let session = ChromiumSession {
                    browser: Mutex::new(browser),
                    page: None,
                    handler_task,
                    _profile: profile,
                };
                Box::new(session).close().await;
                return Err(GenerateError::BrowserLaunch(format!("new page: {e}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
            page: Some(page),
            handler_task,
            _profile: profile,
        }))
    }
}

struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    // Dropped last: Chromium must exit before its profile is removed.
    _profile: TempDir,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, GenerateError> {
        self.page
            .as_ref()
            .ok_or_else(|| GenerateError::Internal("browser session has no page".into()))
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn open(&self, url: &str) -> Result<(), GenerateError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| GenerateError::PageLoad(e.to_string()))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), GenerateError> {
        self.page()?
            .evaluate_expression(SCROLL_SCRIPT)
            .await
            .map_err(|e| GenerateError::PageLoad(format!("scroll: {e}")))?;
        Ok(())
    }

    async fn images_ready(&self, host_pattern: &str) -> Result<bool, GenerateError> {
        let result = self
            .page()?
            .evaluate_expression(images_ready_script(host_pattern))
            .await
            .map_err(|e| GenerateError::PageLoad(format!("image check: {e}")))?;
        result
            .into_value::<bool>()
            .map_err(|e| GenerateError::PageLoad(format!("image check result: {e}")))
    }

    async fn print_pdf(&self, layout: &PageLayout) -> Result<Vec<u8>, GenerateError> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(layout.paper_width),
            paper_height: Some(layout.paper_height),
            margin_top: Some(layout.margin_top),
            margin_bottom: Some(layout.margin_bottom),
            ..Default::default()
        };
        self.page()?
            .pdf(params)
            .await
            .map_err(|e| GenerateError::Capture(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            browser,
            page,
            handler_task,
            _profile,
        } = *self;
        drop(page);
        let mut browser = browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!("browser close: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("browser wait: {}", e);
        }
        handler_task.abort();
        debug!("browser released");
        drop(_profile);
    }
}
