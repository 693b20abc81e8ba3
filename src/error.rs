//! Error types for the facesheet library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GenerateError`]: **Fatal**: the run cannot proceed (no identity,
//!   unreadable roster, browser missing, upload refused). The orchestrator
//!   turns it into a terminal `Error` result; it never escapes as a panic.
//!
//! * [`RemoteError`]: **Per call**: a single request to a collaborator
//!   (spreadsheet, asset folder, object store) failed. Each stage decides
//!   whether that degrades the run (asset index, delete-before-create) or is
//!   wrapped into a [`GenerateError`] and aborts it.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`GenerateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    Input,
    Fetch,
    Render,
    Publish,
    Io,
    Config,
    Internal,
}

/// All fatal errors returned by the facesheet library.
#[derive(Debug, Error)]
pub enum GenerateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No caller identity was supplied.
    #[error("No caller identity supplied; sign in before generating")]
    MissingIdentity,

    /// The identity is not an email address.
    #[error("Identity '{identity}' is not a valid email address")]
    InvalidIdentity { identity: String },

    /// No spreadsheet reference was supplied.
    #[error("No sheet reference supplied")]
    MissingSheetReference,

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The spreadsheet (or one of its worksheets) could not be read.
    #[error("Could not read sheet '{sheet}': {source}")]
    SheetUnavailable {
        sheet: String,
        #[source]
        source: RemoteError,
    },

    /// A required worksheet is not present in the spreadsheet.
    #[error("Worksheet '{worksheet}' not found")]
    WorksheetMissing { worksheet: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The named template is not registered.
    #[error("Template '{name}' not found")]
    TemplateNotFound { name: String },

    /// Handlebars failed while rendering (missing key, bad helper, …).
    #[error("Template rendering failed: {0}")]
    TemplateRender(String),

    /// A page-size or margin setting could not be interpreted.
    #[error("Invalid value {value:?} for setting '{key}'")]
    InvalidSetting { key: String, value: String },

    /// The headless browser could not be started.
    #[error(
        "Failed to launch the rendering browser: {0}\n\
Install Chromium or set CHROME_PATH=/path/to/chrome."
    )]
    BrowserLaunch(String),

    /// The page did not fire `load` within the allowed time.
    #[error("Page did not finish loading within {secs}s")]
    PageLoadTimeout { secs: u64 },

    /// Navigation to the rendered document failed.
    #[error("Page load failed: {0}")]
    PageLoad(String),

    /// The browser failed to capture the page as PDF.
    #[error("PDF capture failed: {0}")]
    Capture(String),

    /// The capture reported success but no file exists at the target path.
    #[error("PDF was not written: '{path}' does not exist")]
    OutputMissing { path: PathBuf },

    // ── Publish errors ────────────────────────────────────────────────────
    /// The document could not be uploaded; the local copy is kept.
    #[error("Failed to publish '{name}'; no link was returned")]
    PublishFailed { name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a local output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenerateError {
    /// Which part of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingIdentity | Self::InvalidIdentity { .. } | Self::MissingSheetReference => {
                ErrorKind::Input
            }
            Self::SheetUnavailable { .. } | Self::WorksheetMissing { .. } => ErrorKind::Fetch,
            Self::TemplateNotFound { .. }
            | Self::TemplateRender(_)
            | Self::InvalidSetting { .. }
            | Self::BrowserLaunch(_)
            | Self::PageLoadTimeout { .. }
            | Self::PageLoad(_)
            | Self::Capture(_)
            | Self::OutputMissing { .. } => ErrorKind::Render,
            Self::PublishFailed { .. } => ErrorKind::Publish,
            Self::OutputWriteFailed { .. } => ErrorKind::Io,
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A failed call to a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, timeout, …).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}
