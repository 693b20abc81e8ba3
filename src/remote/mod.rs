//! Remote collaborators: the spreadsheet, the asset folder and the object
//! store the pipeline reads from and publishes to.
//!
//! The pipeline only sees the three traits below. [`sheets::GoogleSheets`]
//! and [`drive::GoogleDrive`] talk to the Google REST APIs;
//! [`memory::MemoryWorkspace`] keeps everything in process for tests and
//! offline runs.
//!
//! ```text
//! TabularSource ── rows of string cells, sheet titles, sheet listing
//! AssetStore    ── folder listing (paged), lookup by name, bytes, size
//! ObjectStore   ── find-by-name, delete, create
//! ```

pub mod drive;
pub mod google;
pub mod memory;
pub mod sheets;

use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const PDF_MIME: &str = "application/pdf";

/// A child of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    /// Empty when the listing asked for ids only.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    pub entries: Vec<RemoteEntry>,
    /// Present while more pages remain.
    pub next_page_token: Option<String>,
}

/// A spreadsheet found under a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSummary {
    pub id: String,
    pub name: String,
    pub modified_time: Option<DateTime<Utc>>,
}

impl SheetSummary {
    /// Last-modified time as shown to people, e.g. `07 Mar 2025, 14:05`.
    pub fn modified_display(&self) -> String {
        self.modified_time
            .map(|t| t.format("%d %b %Y, %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Reads spreadsheets as rows of string cells.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Title of the spreadsheet.
    async fn title(&self, sheet: &str) -> Result<String, RemoteError>;

    /// Every row of a worksheet, header included. Rows may be ragged.
    ///
    /// A worksheet that does not exist yields [`RemoteError::NotFound`].
    async fn rows(&self, sheet: &str, worksheet: &str) -> Result<Vec<Vec<String>>, RemoteError>;

    /// Spreadsheets under `folder`, most recently modified first.
    async fn list_sheets(&self, folder: &str) -> Result<Vec<SheetSummary>, RemoteError>;
}

/// Read access to the folder of roster images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// One page of the non-trashed children of `folder`.
    async fn list_children(
        &self,
        folder: &str,
        page_token: Option<&str>,
    ) -> Result<EntryPage, RemoteError>;

    /// The child folder of `parent` called `name`, if any.
    async fn find_folder(&self, parent: &str, name: &str)
        -> Result<Option<RemoteEntry>, RemoteError>;

    /// Raw content of a file.
    async fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Size in bytes, when the store knows it.
    async fn file_size(&self, id: &str) -> Result<Option<u64>, RemoteError>;
}

/// Write access to the folder receiving published documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Ids of the live entries of `parent` named exactly `name`.
    async fn find_by_name(&self, parent: &str, name: &str) -> Result<Vec<String>, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    /// Create a new entry and return its id.
    async fn create(
        &self,
        parent: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError>;
}
