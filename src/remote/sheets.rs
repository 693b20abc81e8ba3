//! Google Sheets v4 client implementing [`TabularSource`].

use super::google::{quote, ApiClient};
use super::{SheetSummary, TabularSource, SPREADSHEET_MIME};
use crate::config::GoogleConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct Spreadsheet {
    properties: SpreadsheetProperties,
}

#[derive(Deserialize)]
struct SpreadsheetProperties {
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetFile {
    id: String,
    name: String,
    modified_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetFileList {
    #[serde(default)]
    files: Vec<SheetFile>,
    next_page_token: Option<String>,
}

/// Reads worksheets through the Sheets REST API; lists spreadsheets via Drive.
#[derive(Clone)]
pub struct GoogleSheets {
    api: Arc<ApiClient>,
}

impl GoogleSheets {
    pub fn new(config: GoogleConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            api: Arc::new(ApiClient::new(config)?),
        })
    }

    pub fn with_client(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

/// Cells arrive as JSON scalars; render them the way the sheet displays them.
fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The Sheets API answers 400 "Unable to parse range" for an unknown tab.
fn is_missing_range(err: &RemoteError) -> bool {
    matches!(err, RemoteError::Http { status: 400, body } if body.contains("Unable to parse range"))
}

#[async_trait]
impl TabularSource for GoogleSheets {
    async fn title(&self, sheet: &str) -> Result<String, RemoteError> {
        let base = &self.api.config().sheets_base_url;
        let url = self.api.url(base, &["v4", "spreadsheets", sheet])?;
        let spreadsheet: Spreadsheet = self
            .api
            .send_json(self.api.get(url).query(&[("fields", "properties.title")]))
            .await?;
        Ok(spreadsheet.properties.title)
    }

    async fn rows(&self, sheet: &str, worksheet: &str) -> Result<Vec<Vec<String>>, RemoteError> {
        let base = &self.api.config().sheets_base_url;
        let url = self
            .api
            .url(base, &["v4", "spreadsheets", sheet, "values", worksheet])?;
        let range: ValueRange = match self.api.send_json(self.api.get(url)).await {
            Ok(r) => r,
            Err(e) if is_missing_range(&e) => {
                return Err(RemoteError::NotFound(format!("worksheet '{worksheet}'")))
            }
            Err(e) => return Err(e),
        };
        debug!(worksheet, rows = range.values.len(), "fetched worksheet");
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn list_sheets(&self, folder: &str) -> Result<Vec<SheetSummary>, RemoteError> {
        let base = &self.api.config().drive_base_url;
        let url = self.api.url(base, &["drive", "v3", "files"])?;
        let q = format!(
            "{} in parents and mimeType='{}' and trashed=false",
            quote(folder),
            SPREADSHEET_MIME
        );
        let mut sheets = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut request = self.api.get(url.clone()).query(&[
                ("q", q.as_str()),
                ("fields", "nextPageToken, files(id, name, modifiedTime)"),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", "1000"),
            ]);
            if let Some(ref t) = token {
                request = request.query(&[("pageToken", t.as_str())]);
            }
            let list: SheetFileList = self.api.send_json(request).await?;
            sheets.extend(list.files.into_iter().map(|f| SheetSummary {
                id: f.id,
                name: f.name,
                modified_time: f.modified_time,
            }));
            match list.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(sheets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_text(Value::String("Lead".into())), "Lead");
        assert_eq!(cell_text(serde_json::json!(42)), "42");
        assert_eq!(cell_text(serde_json::json!(true)), "true");
        assert_eq!(cell_text(Value::Null), "");
    }

    #[test]
    fn missing_range_detection() {
        let e = RemoteError::Http {
            status: 400,
            body: r#"{"error":{"message":"Unable to parse range: People"}}"#.into(),
        };
        assert!(is_missing_range(&e));
        assert!(!is_missing_range(&RemoteError::Http {
            status: 403,
            body: "Unable to parse range".into()
        }));
    }
}
