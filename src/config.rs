//! Configuration types for facesheet generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. Remote endpoints and credentials live
//! in the separate [`GoogleConfig`] so the pipeline can run against in-memory
//! collaborators without any of them set.

use crate::error::GenerateError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the template embedded in the library.
pub const DEFAULT_TEMPLATE_NAME: &str = "facesheet.html";

/// Thumbnail URL pattern for Drive images; `{id}` is replaced by the file id.
pub const DEFAULT_IMAGE_URL_TEMPLATE: &str =
    "https://lh3.googleusercontent.com/d/{id}=s220?authuser=0";

/// Configuration for a generation run.
///
/// # Example
/// ```rust
/// use facesheet::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .parent_folder_id("1AbCdEf")
///     .image_folder_id("1ImAgEs")
///     .output_dir("/tmp/facesheets")
///     .build()
///     .unwrap();
/// assert_eq!(config.image_wait_retries, 3);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Directory of extra Handlebars templates. `None` uses only the embedded one.
    pub template_dir: Option<PathBuf>,

    /// Template rendered for the document. Default: `facesheet.html`.
    pub template_name: String,

    /// Where the HTML and PDF artifacts are written. Default: `output`.
    pub output_dir: PathBuf,

    /// Worksheet holding the two-column settings table. Default: `Settings`.
    pub settings_worksheet: String,

    /// Worksheet holding the roster. Default: `People`.
    pub people_worksheet: String,

    /// Category cell value (case-insensitive) meaning "no category". Default: `N/A`.
    pub category_sentinel: String,

    /// Settings key naming the logo asset. Default: `Logo`.
    pub logo_setting_key: String,

    /// Logo asset name when the settings key is absent. Default: `logo`.
    pub default_logo_name: String,

    /// Drive folder holding the roster images. `None` disables the index.
    pub image_folder_id: Option<String>,

    /// Name of a subfolder of `image_folder_id` to index instead of the
    /// folder itself (one-folder-per-roster layouts).
    pub image_subfolder: Option<String>,

    /// Durable image reference pattern; `{id}` is replaced by the asset id.
    pub image_url_template: String,

    /// Substring identifying remotely hosted `<img>` sources the paginator
    /// waits for. Default: `googleusercontent.com`.
    pub image_host_pattern: String,

    /// Download images next to the output instead of linking them remotely.
    pub mirror_images: bool,

    /// Drive folder receiving the published PDF.
    pub parent_folder_id: String,

    /// Host used to build viewer links. Default: `drive.google.com`.
    pub viewer_host: String,

    /// Seconds to wait for the page `load` event. Default: 30.
    pub load_timeout_secs: u64,

    /// Pause after scrolling, letting lazy images start. Default: 1000 ms.
    pub settle_ms: u64,

    /// Image-readiness re-checks after the first. Default: 3.
    pub image_wait_retries: u32,

    /// Fixed delay between image-readiness checks. Default: 10 s.
    pub image_wait_interval_secs: u64,

    /// Browser executable. `None` lets `chrome-auto` locate one.
    pub chrome_executable: Option<PathBuf>,

    /// Receives every progress line and stage transition.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            output_dir: PathBuf::from("output"),
            settings_worksheet: "Settings".to_string(),
            people_worksheet: "People".to_string(),
            category_sentinel: "N/A".to_string(),
            logo_setting_key: "Logo".to_string(),
            default_logo_name: "logo".to_string(),
            image_folder_id: None,
            image_subfolder: None,
            image_url_template: DEFAULT_IMAGE_URL_TEMPLATE.to_string(),
            image_host_pattern: "googleusercontent.com".to_string(),
            mirror_images: false,
            parent_folder_id: String::new(),
            viewer_host: "drive.google.com".to_string(),
            load_timeout_secs: 30,
            settle_ms: 1000,
            image_wait_retries: 3,
            image_wait_interval_secs: 10,
            chrome_executable: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("template_dir", &self.template_dir)
            .field("template_name", &self.template_name)
            .field("output_dir", &self.output_dir)
            .field("settings_worksheet", &self.settings_worksheet)
            .field("people_worksheet", &self.people_worksheet)
            .field("image_folder_id", &self.image_folder_id)
            .field("image_subfolder", &self.image_subfolder)
            .field("mirror_images", &self.mirror_images)
            .field("parent_folder_id", &self.parent_folder_id)
            .field("load_timeout_secs", &self.load_timeout_secs)
            .field("image_wait_retries", &self.image_wait_retries)
            .field("image_wait_interval_secs", &self.image_wait_interval_secs)
            .field("chrome_executable", &self.chrome_executable)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn image_wait_interval(&self) -> Duration {
        Duration::from_secs(self.image_wait_interval_secs)
    }

    /// Build the durable reference for an asset id.
    pub fn image_url(&self, id: &str) -> String {
        self.image_url_template.replace("{id}", id)
    }

    /// Build the public viewer link for a published file id.
    pub fn viewer_link(&self, id: &str) -> String {
        format!("https://{}/file/d/{}/view", self.viewer_host, id)
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_dir = Some(dir.into());
        self
    }

    pub fn template_name(mut self, name: impl Into<String>) -> Self {
        self.config.template_name = name.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn settings_worksheet(mut self, name: impl Into<String>) -> Self {
        self.config.settings_worksheet = name.into();
        self
    }

    pub fn people_worksheet(mut self, name: impl Into<String>) -> Self {
        self.config.people_worksheet = name.into();
        self
    }

    pub fn category_sentinel(mut self, token: impl Into<String>) -> Self {
        self.config.category_sentinel = token.into();
        self
    }

    pub fn logo_setting_key(mut self, key: impl Into<String>) -> Self {
        self.config.logo_setting_key = key.into();
        self
    }

    pub fn default_logo_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_logo_name = name.into();
        self
    }

    pub fn image_folder_id(mut self, id: impl Into<String>) -> Self {
        self.config.image_folder_id = Some(id.into());
        self
    }

    pub fn image_subfolder(mut self, name: impl Into<String>) -> Self {
        self.config.image_subfolder = Some(name.into());
        self
    }

    pub fn image_url_template(mut self, template: impl Into<String>) -> Self {
        self.config.image_url_template = template.into();
        self
    }

    pub fn image_host_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.image_host_pattern = pattern.into();
        self
    }

    pub fn mirror_images(mut self, v: bool) -> Self {
        self.config.mirror_images = v;
        self
    }

    pub fn parent_folder_id(mut self, id: impl Into<String>) -> Self {
        self.config.parent_folder_id = id.into();
        self
    }

    pub fn viewer_host(mut self, host: impl Into<String>) -> Self {
        self.config.viewer_host = host.into();
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs.max(1);
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.settle_ms = ms;
        self
    }

    pub fn image_wait_retries(mut self, n: u32) -> Self {
        self.config.image_wait_retries = n;
        self
    }

    pub fn image_wait_interval_secs(mut self, secs: u64) -> Self {
        self.config.image_wait_interval_secs = secs;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, GenerateError> {
        let c = &self.config;
        if c.parent_folder_id.trim().is_empty() {
            return Err(GenerateError::InvalidConfig(
                "A parent folder id is required to publish the PDF".into(),
            ));
        }
        if c.template_name.trim().is_empty() {
            return Err(GenerateError::InvalidConfig(
                "Template name must not be empty".into(),
            ));
        }
        if !c.image_url_template.contains("{id}") {
            return Err(GenerateError::InvalidConfig(format!(
                "Image URL template must contain '{{id}}', got {:?}",
                c.image_url_template
            )));
        }
        if c.people_worksheet == c.settings_worksheet {
            return Err(GenerateError::InvalidConfig(
                "Settings and People worksheets must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Remote endpoints ─────────────────────────────────────────────────────

/// Drive requires resumable chunks in multiples of 256 KiB.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

/// Credentials and endpoints for the Google REST collaborators.
///
/// Base URLs are overridable so tests can point the clients at a mock server.
#[derive(Clone)]
pub struct GoogleConfig {
    /// OAuth 2 bearer token with Drive and Sheets scopes.
    pub access_token: String,
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub upload_base_url: String,
    /// Bytes per resumable-upload request. Default: 25 MiB.
    pub upload_chunk_size: usize,
    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,
}

impl GoogleConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
            drive_base_url: "https://www.googleapis.com".to_string(),
            upload_base_url: "https://www.googleapis.com".to_string(),
            upload_chunk_size: 25 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }

    /// Point every endpoint at one base URL (mock servers, proxies).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        self.sheets_base_url = base.clone();
        self.drive_base_url = base.clone();
        self.upload_base_url = base;
        self
    }

    /// Set the chunk size, rounded down to the 256 KiB granularity
    /// (never below one granule).
    pub fn with_upload_chunk_size(mut self, bytes: usize) -> Self {
        let granules = (bytes / UPLOAD_CHUNK_GRANULARITY).max(1);
        self.upload_chunk_size = granules * UPLOAD_CHUNK_GRANULARITY;
        self
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("access_token", &"<redacted>")
            .field("sheets_base_url", &self.sheets_base_url)
            .field("drive_base_url", &self.drive_base_url)
            .field("upload_base_url", &self.upload_base_url)
            .field("upload_chunk_size", &self.upload_chunk_size)
            .finish()
    }
}
