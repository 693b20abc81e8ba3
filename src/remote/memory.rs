//! In-process collaborators for tests and offline runs.
//!
//! [`MemoryWorkspace`] implements all three collaborator traits over one
//! shared tree of spreadsheets, folders and files. Listings are paged with a
//! configurable page size so pagination is exercised, and each operation
//! family can be made to fail on demand.

use super::{
    AssetStore, EntryPage, ObjectStore, RemoteEntry, SheetSummary, TabularSource, FOLDER_MIME,
};
use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredSheet {
    title: String,
    folder: Option<String>,
    modified_time: Option<DateTime<Utc>>,
    worksheets: IndexMap<String, Vec<Vec<String>>>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    entry: RemoteEntry,
    parent: String,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Failures {
    sheets: bool,
    listing: bool,
    create: bool,
    delete: bool,
}

#[derive(Debug, Default)]
struct State {
    sheets: IndexMap<String, StoredSheet>,
    files: Vec<StoredFile>,
    next_id: u64,
    failures: Failures,
    list_calls: usize,
}

/// A spreadsheet + Drive look-alike held in memory.
#[derive(Debug)]
pub struct MemoryWorkspace {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    /// Listings return at most `page_size` entries per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Seeding ──────────────────────────────────────────────────────────

    /// Register an empty spreadsheet.
    pub fn add_sheet(&self, id: &str, title: &str) {
        self.state().sheets.insert(
            id.to_string(),
            StoredSheet {
                title: title.to_string(),
                folder: None,
                modified_time: None,
                worksheets: IndexMap::new(),
            },
        );
    }

    /// Place a spreadsheet under `folder` so `list_sheets` finds it.
    pub fn file_sheet(&self, id: &str, folder: &str, modified_time: DateTime<Utc>) {
        if let Some(sheet) = self.state().sheets.get_mut(id) {
            sheet.folder = Some(folder.to_string());
            sheet.modified_time = Some(modified_time);
        }
    }

    /// Replace the rows of a worksheet, creating the spreadsheet if needed.
    pub fn set_worksheet<R, C, S>(&self, sheet: &str, worksheet: &str, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        let mut state = self.state();
        let entry = state
            .sheets
            .entry(sheet.to_string())
            .or_insert_with(|| StoredSheet {
                title: sheet.to_string(),
                folder: None,
                modified_time: None,
                worksheets: IndexMap::new(),
            });
        entry.worksheets.insert(worksheet.to_string(), rows);
    }

    /// Store a file and return its id.
    pub fn add_file(&self, parent: &str, name: &str, mime_type: &str, bytes: Vec<u8>) -> String {
        let mut state = self.state();
        let id = Self::allocate_id(&mut state);
        state.files.push(StoredFile {
            entry: RemoteEntry {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
            },
            parent: parent.to_string(),
            bytes,
        });
        id
    }

    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        self.add_file(parent, name, FOLDER_MIME, Vec::new())
    }

    fn allocate_id(state: &mut State) -> String {
        state.next_id += 1;
        format!("mem-{:04}", state.next_id)
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Ids of the files under `parent` named `name`.
    pub fn files_named(&self, parent: &str, name: &str) -> Vec<String> {
        self.state()
            .files
            .iter()
            .filter(|f| f.parent == parent && f.entry.name == name)
            .map(|f| f.entry.id.clone())
            .collect()
    }

    pub fn file_bytes(&self, id: &str) -> Option<Vec<u8>> {
        self.state()
            .files
            .iter()
            .find(|f| f.entry.id == id)
            .map(|f| f.bytes.clone())
    }

    /// Number of `list_children` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    // ── Failure injection ────────────────────────────────────────────────

    /// Make every spreadsheet read fail.
    pub fn fail_sheets(&self, fail: bool) {
        self.state().failures.sheets = fail;
    }

    /// Make folder listing and folder lookup fail.
    pub fn fail_listing(&self, fail: bool) {
        self.state().failures.listing = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        self.state().failures.create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().failures.delete = fail;
    }
}

fn unavailable(what: &str) -> RemoteError {
    RemoteError::Http {
        status: 503,
        body: format!("{what} unavailable"),
    }
}

#[async_trait]
impl TabularSource for MemoryWorkspace {
    async fn title(&self, sheet: &str) -> Result<String, RemoteError> {
        let state = self.state();
        if state.failures.sheets {
            return Err(unavailable("spreadsheet"));
        }
        state
            .sheets
            .get(sheet)
            .map(|s| s.title.clone())
            .ok_or_else(|| RemoteError::NotFound(format!("spreadsheet '{sheet}'")))
    }

    async fn rows(&self, sheet: &str, worksheet: &str) -> Result<Vec<Vec<String>>, RemoteError> {
        let state = self.state();
        if state.failures.sheets {
            return Err(unavailable("spreadsheet"));
        }
        let stored = state
            .sheets
            .get(sheet)
            .ok_or_else(|| RemoteError::NotFound(format!("spreadsheet '{sheet}'")))?;
        stored
            .worksheets
            .get(worksheet)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("worksheet '{worksheet}'")))
    }

    async fn list_sheets(&self, folder: &str) -> Result<Vec<SheetSummary>, RemoteError> {
        let state = self.state();
        if state.failures.sheets {
            return Err(unavailable("spreadsheet listing"));
        }
        let mut found: Vec<SheetSummary> = state
            .sheets
            .iter()
            .filter(|(_, s)| s.folder.as_deref() == Some(folder))
            .map(|(id, s)| SheetSummary {
                id: id.clone(),
                name: s.title.clone(),
                modified_time: s.modified_time,
            })
            .collect();
        found.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        Ok(found)
    }
}

#[async_trait]
impl AssetStore for MemoryWorkspace {
    async fn list_children(
        &self,
        folder: &str,
        page_token: Option<&str>,
    ) -> Result<EntryPage, RemoteError> {
        let mut state = self.state();
        state.list_calls += 1;
        if state.failures.listing {
            return Err(unavailable("folder listing"));
        }
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::Decode(format!("bad page token '{token}'")))?,
            None => 0,
        };
        let children: Vec<RemoteEntry> = state
            .files
            .iter()
            .filter(|f| f.parent == folder)
            .map(|f| f.entry.clone())
            .collect();
        let end = (offset + self.page_size).min(children.len());
        let entries = children.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_page_token = (end < children.len()).then(|| end.to_string());
        Ok(EntryPage {
            entries,
            next_page_token,
        })
    }

    async fn find_folder(
        &self,
        parent: &str,
        name: &str,
    ) -> Result<Option<RemoteEntry>, RemoteError> {
        let state = self.state();
        if state.failures.listing {
            return Err(unavailable("folder listing"));
        }
        Ok(state
            .files
            .iter()
            .find(|f| f.parent == parent && f.entry.name == name && f.entry.is_folder())
            .map(|f| f.entry.clone()))
    }

    async fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        self.file_bytes(id)
            .ok_or_else(|| RemoteError::NotFound(format!("file '{id}'")))
    }

    async fn file_size(&self, id: &str) -> Result<Option<u64>, RemoteError> {
        Ok(self.file_bytes(id).map(|b| b.len() as u64))
    }
}

#[async_trait]
impl ObjectStore for MemoryWorkspace {
    async fn find_by_name(&self, parent: &str, name: &str) -> Result<Vec<String>, RemoteError> {
        if self.state().failures.listing {
            return Err(unavailable("folder listing"));
        }
        Ok(self.files_named(parent, name))
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        if state.failures.delete {
            return Err(unavailable("delete"));
        }
        let before = state.files.len();
        state.files.retain(|f| f.entry.id != id);
        if state.files.len() == before {
            return Err(RemoteError::NotFound(format!("file '{id}'")));
        }
        Ok(())
    }

    async fn create(
        &self,
        parent: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError> {
        if self.state().failures.create {
            return Err(unavailable("upload"));
        }
        Ok(self.add_file(parent, name, mime_type, bytes))
    }
}
