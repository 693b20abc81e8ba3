//! Record fetcher: the settings table and the grouped roster.

use super::assets::AssetIndex;
use super::normalize::delimit;
use crate::error::{GenerateError, RemoteError};
use crate::progress::RunLog;
use crate::remote::TabularSource;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

pub const PAGE_SIZE_KEY: &str = "PDFSize";
pub const TOP_MARGIN_KEY: &str = "TopMargin";
pub const BOTTOM_MARGIN_KEY: &str = "BottomMargin";

pub const DEFAULT_PAGE_SIZE: &str = "A4";
pub const DEFAULT_MARGIN: &str = "0.5in";

// ── Settings ─────────────────────────────────────────────────────────────

/// Key/value settings read from a two-column worksheet.
///
/// Unknown keys are kept as-is and exposed to the template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Settings(IndexMap<String, String>);

impl Settings {
    /// Build from worksheet rows. The first row is a header; rows whose first
    /// cell is blank are skipped; a missing value cell reads as empty.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let mut map = IndexMap::new();
        for row in rows.into_iter().skip(1) {
            let key = row.first().map(|k| k.trim()).unwrap_or_default();
            if key.is_empty() {
                continue;
            }
            let value = row.get(1).map(|v| v.trim()).unwrap_or_default();
            map.insert(key.to_string(), value.to_string());
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or `default` when absent or blank.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).filter(|v| !v.is_empty()).unwrap_or(default)
    }

    pub fn page_size(&self) -> &str {
        self.get_or(PAGE_SIZE_KEY, DEFAULT_PAGE_SIZE)
    }

    pub fn top_margin(&self) -> &str {
        self.get_or(TOP_MARGIN_KEY, DEFAULT_MARGIN)
    }

    pub fn bottom_margin(&self) -> &str {
        self.get_or(BOTTOM_MARGIN_KEY, DEFAULT_MARGIN)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── People ───────────────────────────────────────────────────────────────

/// One roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonRecord {
    /// Empty when the row had no category or the sentinel.
    pub category: String,
    pub name: String,
    pub title: String,
    pub show: String,
    pub image_reference: Option<String>,
}

/// Records keyed by category, in first-seen category order and row order
/// within each category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedRecords(IndexMap<String, Vec<PersonRecord>>);

/// One category as handed to the template.
#[derive(Debug, Serialize)]
pub struct CategoryGroup<'a> {
    pub category: &'a str,
    pub people: &'a [PersonRecord],
}

impl GroupedRecords {
    pub fn push(&mut self, record: PersonRecord) {
        self.0
            .entry(record.category.clone())
            .or_default()
            .push(record);
    }

    pub fn get(&self, category: &str) -> Option<&[PersonRecord]> {
        self.0.get(category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of categories.
    pub fn group_count(&self) -> usize {
        self.0.len()
    }

    /// Number of records across every category.
    pub fn record_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ordered view for rendering.
    pub fn groups(&self) -> Vec<CategoryGroup<'_>> {
        self.0
            .iter()
            .map(|(category, people)| CategoryGroup {
                category,
                people,
            })
            .collect()
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn cell(row: &[String], i: usize) -> String {
    row.get(i).map(|c| c.trim().to_string()).unwrap_or_default()
}

/// Group roster rows (header first) and resolve each person's image.
///
/// Columns: category, name, title, show. A category equal to `sentinel`
/// (case-insensitive) becomes the empty category.
pub fn group_rows(
    rows: Vec<Vec<String>>,
    sentinel: &str,
    index: &AssetIndex,
    log: &RunLog,
) -> GroupedRecords {
    let sentinel = sentinel.trim().to_lowercase();
    let mut grouped = GroupedRecords::default();

    for (n, row) in rows.into_iter().enumerate().skip(1) {
        if is_blank(&row) {
            continue;
        }
        let mut category = cell(&row, 0);
        if !sentinel.is_empty() && category.to_lowercase() == sentinel {
            category.clear();
        }
        let name = cell(&row, 1);
        let image_reference = if name.is_empty() {
            log.warn(format!("Row {} has no name", n + 1));
            None
        } else {
            index.lookup(&delimit(&name), log).map(str::to_owned)
        };
        grouped.push(PersonRecord {
            category,
            title: cell(&row, 2),
            show: cell(&row, 3),
            name,
            image_reference,
        });
    }
    grouped
}

fn worksheet_error(sheet: &str, worksheet: &str, err: RemoteError) -> GenerateError {
    match err {
        RemoteError::NotFound(_) => GenerateError::WorksheetMissing {
            worksheet: worksheet.to_string(),
        },
        source => GenerateError::SheetUnavailable {
            sheet: sheet.to_string(),
            source,
        },
    }
}

/// Read the settings worksheet.
pub async fn fetch_settings(
    source: &dyn TabularSource,
    sheet: &str,
    worksheet: &str,
) -> Result<Settings, GenerateError> {
    let rows = source
        .rows(sheet, worksheet)
        .await
        .map_err(|e| worksheet_error(sheet, worksheet, e))?;
    debug!(rows = rows.len(), "settings rows");
    Ok(Settings::from_rows(rows))
}

/// Read the roster worksheet and group it by category.
pub async fn fetch_people(
    source: &dyn TabularSource,
    sheet: &str,
    worksheet: &str,
    sentinel: &str,
    index: &AssetIndex,
    log: &RunLog,
) -> Result<GroupedRecords, GenerateError> {
    let rows = source
        .rows(sheet, worksheet)
        .await
        .map_err(|e| worksheet_error(sheet, worksheet, e))?;
    Ok(group_rows(rows, sentinel, index, log))
}
