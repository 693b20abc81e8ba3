//! The orchestrator: one call from identity + sheet to a published PDF.
//!
//! ```text
//! Started → SettingsFetched → ImagesIndexed → RecordsGrouped
//!         → Rendered → Paginated → Published → Done(Success)
//! ```
//!
//! Input is checked right after `Started`, so a rejected call still reports
//! `Started → Done(Error)`. Any stage error jumps straight to `Done(Error)`. Nothing is retried here;
//! the only retry loop lives inside the paginator. Whatever happens, the
//! caller receives a [`GenerationResult`] carrying the full run log.

use crate::config::{GeneratorConfig, GoogleConfig};
use crate::error::GenerateError;
use crate::output::{GenerationResult, GenerationStatus};
use crate::pipeline::assets::AssetIndex;
use crate::pipeline::engine::{ChromiumEngine, RenderEngine};
use crate::pipeline::paginate::Paginator;
use crate::pipeline::publish::Publisher;
use crate::pipeline::records::{self, GroupedRecords};
use crate::pipeline::render::{RenderContext, Renderer};
use crate::progress::{LogTag, ProgressCallback, RunLog, Stage};
use crate::remote::drive::GoogleDrive;
use crate::remote::google::ApiClient;
use crate::remote::sheets::GoogleSheets;
use crate::remote::{AssetStore, ObjectStore, SheetSummary, TabularSource, PDF_MIME};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{error, info};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex"));

/// The collaborators a [`Generator`] runs against.
#[derive(Clone)]
pub struct Services {
    pub sheets: Arc<dyn TabularSource>,
    pub assets: Arc<dyn AssetStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub engine: Arc<dyn RenderEngine>,
}

/// Runs generations against one configuration and set of collaborators.
///
/// Every run builds its own settings, index and roster, so one `Generator`
/// can serve concurrent runs.
pub struct Generator {
    config: GeneratorConfig,
    services: Services,
    renderer: Renderer,
}

impl Generator {
    /// Compile templates and wire the collaborators.
    pub fn new(config: GeneratorConfig, services: Services) -> Result<Self, GenerateError> {
        let renderer = Renderer::new(config.template_dir.as_deref())?;
        if !renderer.has_template(&config.template_name) {
            return Err(GenerateError::TemplateNotFound {
                name: config.template_name.clone(),
            });
        }
        Ok(Self {
            config,
            services,
            renderer,
        })
    }

    /// Google Sheets + Drive collaborators and headless Chromium.
    pub fn google(config: GeneratorConfig, google: GoogleConfig) -> Result<Self, GenerateError> {
        let api = Arc::new(
            ApiClient::new(google)
                .map_err(|e| GenerateError::InvalidConfig(format!("HTTP client: {e}")))?,
        );
        let drive = Arc::new(GoogleDrive::with_client(Arc::clone(&api)));
        let services = Services {
            sheets: Arc::new(GoogleSheets::with_client(api)),
            assets: drive.clone(),
            objects: drive,
            engine: Arc::new(ChromiumEngine::from_config(&config)),
        };
        Self::new(config, services)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate, reporting progress to the configured callback.
    pub async fn generate(&self, identity: &str, sheet: &str) -> GenerationResult {
        self.generate_with(identity, sheet, self.config.progress_callback.clone())
            .await
    }

    /// Generate, reporting progress to `callback` instead of the configured one.
    pub async fn generate_with(
        &self,
        identity: &str,
        sheet: &str,
        callback: Option<ProgressCallback>,
    ) -> GenerationResult {
        let started = Instant::now();
        let log = RunLog::new(callback);
        let mut people = None;

        let outcome = self.run(identity, sheet, &log, &mut people).await;

        let (status, pdf_link, error) = match outcome {
            Ok(link) => {
                log.push(LogTag::Done, format!("All done! PDF Link: {link}"));
                (GenerationStatus::Success, Some(link), None)
            }
            Err(e) => {
                error!(kind = ?e.kind(), "generation failed: {}", e);
                log.fatal(format!("Error during generation: {e}"));
                (GenerationStatus::Error, None, Some(e.to_string()))
            }
        };
        log.stage(Stage::Done);

        GenerationResult {
            status,
            pdf_link,
            duration: Some(started.elapsed().as_secs_f64()),
            error,
            log: log.into_lines(),
            people,
        }
    }

    /// Blocking wrapper around [`Generator::generate`] for non-async callers.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn generate_sync(&self, identity: &str, sheet: &str) -> GenerationResult {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.generate(identity, sheet)),
            Err(e) => {
                let message = format!("Failed to create tokio runtime: {e}");
                GenerationResult {
                    status: GenerationStatus::Error,
                    pdf_link: None,
                    duration: None,
                    error: Some(message.clone()),
                    log: vec![format!("{} {message}", LogTag::Fatal.glyph())],
                    people: None,
                }
            }
        }
    }

    /// Spreadsheets in the parent folder, newest first.
    pub async fn list_sheets(&self) -> Result<Vec<SheetSummary>, GenerateError> {
        let folder = &self.config.parent_folder_id;
        self.services
            .sheets
            .list_sheets(folder)
            .await
            .map_err(|source| GenerateError::SheetUnavailable {
                sheet: folder.clone(),
                source,
            })
    }

    async fn run(
        &self,
        identity: &str,
        sheet: &str,
        log: &RunLog,
        people_out: &mut Option<GroupedRecords>,
    ) -> Result<String, GenerateError> {
        log.stage(Stage::Started);
        let identity = normalize_identity(identity)?;
        let sheet = sheet.trim();
        if sheet.is_empty() {
            return Err(GenerateError::MissingSheetReference);
        }
        let config = &self.config;
        let services = &self.services;

        log.start(format!("Starting generation for {identity}"));

        // ── Settings ─────────────────────────────────────────────────────
        let title = services
            .sheets
            .title(sheet)
            .await
            .map_err(|source| GenerateError::SheetUnavailable {
                sheet: sheet.to_string(),
                source,
            })?;
        log.progress(format!("Reading settings from '{title}'"));
        let settings =
            records::fetch_settings(services.sheets.as_ref(), sheet, &config.settings_worksheet)
                .await?;
        log.ok(format!("Fetched {} settings", settings.len()));
        log.stage(Stage::SettingsFetched);

        // ── Images ───────────────────────────────────────────────────────
        let index = match &config.image_folder_id {
            Some(folder) => {
                log.progress("Indexing images");
                AssetIndex::build(
                    services.assets.as_ref(),
                    folder,
                    config.image_subfolder.as_deref(),
                    config,
                    log,
                )
                .await
            }
            None => {
                log.warn("No image folder configured; continuing without images");
                AssetIndex::new()
            }
        };
        log.stage(Stage::ImagesIndexed);

        // ── People ───────────────────────────────────────────────────────
        let grouped = records::fetch_people(
            services.sheets.as_ref(),
            sheet,
            &config.people_worksheet,
            &config.category_sentinel,
            &index,
            log,
        )
        .await?;
        log.ok(format!(
            "Grouped {} people into {} categories",
            grouped.record_count(),
            grouped.group_count()
        ));
        log.stage(Stage::RecordsGrouped);
        let grouped: &GroupedRecords = people_out.insert(grouped);

        // ── Render ───────────────────────────────────────────────────────
        let logo_name = settings.get_or(&config.logo_setting_key, &config.default_logo_name);
        let logo = index.lookup(logo_name, log);
        let context = RenderContext::new(&title, &settings, grouped, &identity, logo);
        let html = self.renderer.render(&config.template_name, &context)?;
        log.ok("Rendered HTML");
        log.stage(Stage::Rendered);

        // ── Paginate ─────────────────────────────────────────────────────
        let artifacts = Artifacts::new(&config.output_dir, &title).await?;
        let staged_html = artifacts.staged("html");
        let staged_pdf = artifacts.staged("pdf");
        tokio::fs::write(&staged_html, html)
            .await
            .map_err(|source| GenerateError::OutputWriteFailed {
                path: staged_html.clone(),
                source,
            })?;
        Paginator::new(services.engine.as_ref(), config)
            .convert(
                &staged_html,
                &staged_pdf,
                settings.page_size(),
                settings.top_margin(),
                settings.bottom_margin(),
                log,
            )
            .await?;
        artifacts.promote("html").await?;
        let pdf_path = artifacts.promote("pdf").await?;
        log.push(LogTag::Document, format!("Saved {}", pdf_path.display()));
        log.stage(Stage::Paginated);

        // ── Publish ──────────────────────────────────────────────────────
        let remote_name = artifacts.file_name("pdf");
        let published = Publisher::new(services.objects.as_ref(), config)
            .publish(
                &pdf_path,
                &remote_name,
                &config.parent_folder_id,
                PDF_MIME,
                log,
            )
            .await
            .ok_or(GenerateError::PublishFailed { name: remote_name })?;
        info!(id = %published.id, "published");
        log.stage(Stage::Published);

        Ok(published.link)
    }
}

/// Trim and lower-case an email-shaped identity.
pub fn normalize_identity(identity: &str) -> Result<String, GenerateError> {
    let identity = identity.trim().to_lowercase();
    if identity.is_empty() {
        return Err(GenerateError::MissingIdentity);
    }
    if !EMAIL_RE.is_match(&identity) {
        return Err(GenerateError::InvalidIdentity { identity });
    }
    Ok(identity)
}

/// File-name-safe base derived from a sheet title.
pub fn artifact_base(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        "facesheet".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Per-run staging directory inside the output directory.
///
/// Files are written under a unique name and renamed into place only after
/// the PDF exists, so concurrent runs of the same sheet never see each
/// other's half-written files. The last run to finish wins.
struct Artifacts {
    staging: TempDir,
    output_dir: PathBuf,
    base: String,
}

impl Artifacts {
    async fn new(output_dir: &Path, title: &str) -> Result<Self, GenerateError> {
        let io_err = |source| GenerateError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(output_dir).await.map_err(io_err)?;
        let dir = output_dir.to_path_buf();
        let staging = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(".facesheet-")
                .tempdir_in(dir)
        })
        .await
        .map_err(|e| GenerateError::Internal(format!("staging task: {e}")))?
        .map_err(io_err)?;
        Ok(Self {
            staging,
            output_dir: output_dir.to_path_buf(),
            base: artifact_base(title),
        })
    }

    fn file_name(&self, ext: &str) -> String {
        format!("{}.{ext}", self.base)
    }

    fn staged(&self, ext: &str) -> PathBuf {
        self.staging.path().join(self.file_name(ext))
    }

    /// Move a staged file to its final name and return the final path.
    async fn promote(&self, ext: &str) -> Result<PathBuf, GenerateError> {
        let target = self.output_dir.join(self.file_name(ext));
        tokio::fs::rename(self.staged(ext), &target)
            .await
            .map_err(|source| GenerateError::OutputWriteFailed {
                path: target.clone(),
                source,
            })?;
        Ok(target)
    }
}
