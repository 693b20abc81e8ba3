//! Paginator: HTML file → PDF file through a headless browser.
//!
//! ## Steps
//!
//! 1. Launch a fresh engine instance (fatal if it cannot start).
//! 2. Open the local file and wait for `load`, bounded by the load timeout.
//! 3. Scroll to the bottom so lazy images start, then pause briefly.
//! 4. Poll the image-readiness predicate with a fixed delay. Running out of
//!    retries is logged and the capture goes ahead anyway.
//! 5. Print to PDF with the configured paper size and vertical margins.
//! 6. Write the bytes and check the file is on disk.
//!
//! The instance is closed whatever happens in steps 2–6.

use super::engine::{RenderEngine, RenderSession};
use super::layout::PageLayout;
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::progress::{LogTag, RunLog};
use crate::retry::{poll_until, PollOutcome, PollPolicy};
use reqwest::Url;
use std::path::Path;
use tracing::debug;

pub struct Paginator<'a> {
    engine: &'a dyn RenderEngine,
    config: &'a GeneratorConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(engine: &'a dyn RenderEngine, config: &'a GeneratorConfig) -> Self {
        Self { engine, config }
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.config.image_wait_retries,
            self.config.image_wait_interval(),
        )
    }

    /// Convert `markup_path` into a PDF at `output_path`.
    pub async fn convert(
        &self,
        markup_path: &Path,
        output_path: &Path,
        page_size: &str,
        top_margin: &str,
        bottom_margin: &str,
        log: &RunLog,
    ) -> Result<(), GenerateError> {
        let layout = PageLayout::parse(page_size, top_margin, bottom_margin)?;
        let url = file_url(markup_path).await?;

        log.progress("Launching browser");
        let session = self.engine.launch().await?;
        let outcome = self
            .capture(session.as_ref(), &url, output_path, &layout, log)
            .await;
        session.close().await;
        outcome
    }

    async fn capture(
        &self,
        session: &dyn RenderSession,
        url: &str,
        output_path: &Path,
        layout: &PageLayout,
        log: &RunLog,
    ) -> Result<(), GenerateError> {
        let timeout = self.config.load_timeout();
        tokio::time::timeout(timeout, session.open(url))
            .await
            .map_err(|_| GenerateError::PageLoadTimeout {
                secs: timeout.as_secs(),
            })??;
        debug!(url, "page loaded");

        session.scroll_to_bottom().await?;
        tokio::time::sleep(self.config.settle_delay()).await;

        let pattern = self.config.image_host_pattern.as_str();
        let policy = self.poll_policy();
        let outcome = poll_until(&policy, || async move {
            match session.images_ready(pattern).await {
                Ok(ready) => ready,
                Err(e) => {
                    debug!("image check failed: {}", e);
                    false
                }
            }
        })
        .await;
        match outcome {
            PollOutcome::Ready { retries: 0 } => log.ok("All images loaded"),
            PollOutcome::Ready { retries } => {
                log.ok(format!("All images loaded after {retries} retries"))
            }
            PollOutcome::Exhausted { retries } => log.warn(format!(
                "Some images may not have loaded after {retries} retries; continuing"
            )),
        }

        let pdf = session.print_pdf(layout).await?;
        tokio::fs::write(output_path, &pdf)
            .await
            .map_err(|source| GenerateError::OutputWriteFailed {
                path: output_path.to_path_buf(),
                source,
            })?;

        let exists = tokio::fs::try_exists(output_path).await.unwrap_or(false);
        if !exists {
            return Err(GenerateError::OutputMissing {
                path: output_path.to_path_buf(),
            });
        }
        log.push(LogTag::Document, format!("PDF created ({} bytes)", pdf.len()));
        Ok(())
    }
}

/// `file://` URL for a local file.
async fn file_url(path: &Path) -> Result<String, GenerateError> {
    let absolute = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| GenerateError::PageLoad(format!("{}: {e}", path.display())))?;
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|()| GenerateError::PageLoad(format!("not a file path: {}", absolute.display())))
}
