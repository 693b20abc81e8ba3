//! Google Drive v3 client implementing [`AssetStore`] and [`ObjectStore`].
//!
//! ## Resumable uploads
//!
//! `create` always uses the resumable protocol: one POST opens an upload
//! session (the session URI comes back in `Location`), then the bytes are
//! PUT in `upload_chunk_size` slices with a `Content-Range` header. Drive
//! answers `308` while bytes remain, with `Range: bytes=0-N` naming what it
//! kept; the next slice starts at `N + 1`. The final answer is `200`/`201`
//! with the file metadata.

use super::google::{check, quote, ApiClient};
use super::{AssetStore, EntryPage, ObjectStore, RemoteEntry, FOLDER_MIME};
use crate::config::GoogleConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteEntry>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FileSize {
    size: Option<String>,
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive client for the image folder and the publish folder.
#[derive(Clone)]
pub struct GoogleDrive {
    api: Arc<ApiClient>,
}

impl GoogleDrive {
    pub fn new(config: GoogleConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            api: Arc::new(ApiClient::new(config)?),
        })
    }

    pub fn with_client(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    fn files_url(&self, extra: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = vec!["drive", "v3", "files"];
        segments.extend_from_slice(extra);
        self.api.url(&self.api.config().drive_base_url, &segments)
    }

    async fn query(
        &self,
        q: &str,
        fields: &str,
        page_token: Option<&str>,
    ) -> Result<FileList, RemoteError> {
        let mut request = self.api.get(self.files_url(&[])?).query(&[
            ("q", q),
            ("fields", fields),
            ("pageSize", "1000"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        self.api.send_json(request).await
    }

    /// Open a resumable session and return its URI.
    async fn start_upload(
        &self,
        parent: &str,
        name: &str,
        mime_type: &str,
        total: usize,
    ) -> Result<Url, RemoteError> {
        let url = self.api.url(
            &self.api.config().upload_base_url,
            &["upload", "drive", "v3", "files"],
        )?;
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent],
            "mimeType": mime_type,
        });
        let response = self
            .api
            .post(url)
            .query(&[
                ("uploadType", "resumable"),
                ("fields", "id"),
                ("supportsAllDrives", "true"),
            ])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", total.to_string())
            .json(&metadata)
            .send()
            .await?;
        let response = check(response).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RemoteError::Decode("upload session has no Location header".into()))?;
        Url::parse(location).map_err(|e| RemoteError::Decode(format!("bad session URI: {e}")))
    }
}

/// Consecutive `308`s without progress before an upload is abandoned.
const MAX_UPLOAD_STALLS: u32 = 3;

/// Bytes the server has kept, from a `308` response's `Range: bytes=0-N`.
///
/// No header means nothing was kept and the upload restarts from zero.
fn committed_bytes(range: Option<&str>) -> usize {
    range
        .and_then(|r| r.trim().strip_prefix("bytes=0-"))
        .and_then(|last| last.trim().parse::<usize>().ok())
        .map_or(0, |last| last + 1)
}

/// `Content-Range` value for the slice `[start, end)` of a `total`-byte upload.
fn content_range(start: usize, end: usize, total: usize) -> String {
    if total == 0 {
        "bytes */0".to_string()
    } else {
        format!("bytes {}-{}/{}", start, end - 1, total)
    }
}

#[async_trait]
impl AssetStore for GoogleDrive {
    async fn list_children(
        &self,
        folder: &str,
        page_token: Option<&str>,
    ) -> Result<EntryPage, RemoteError> {
        let q = format!("{} in parents and trashed=false", quote(folder));
        let list = self
            .query(&q, "nextPageToken, files(id, name, mimeType)", page_token)
            .await?;
        Ok(EntryPage {
            entries: list.files,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn find_folder(
        &self,
        parent: &str,
        name: &str,
    ) -> Result<Option<RemoteEntry>, RemoteError> {
        let q = format!(
            "{} in parents and name={} and mimeType='{}' and trashed=false",
            quote(parent),
            quote(name),
            FOLDER_MIME
        );
        let list = self.query(&q, "files(id, name, mimeType)", None).await?;
        Ok(list.files.into_iter().next())
    }

    async fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        let request = self
            .api
            .get(self.files_url(&[id])?)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let response = check(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn file_size(&self, id: &str) -> Result<Option<u64>, RemoteError> {
        let request = self
            .api
            .get(self.files_url(&[id])?)
            .query(&[("fields", "size"), ("supportsAllDrives", "true")]);
        let meta: FileSize = self.api.send_json(request).await?;
        Ok(meta.size.and_then(|s| s.parse().ok()))
    }
}

#[async_trait]
impl ObjectStore for GoogleDrive {
    async fn find_by_name(&self, parent: &str, name: &str) -> Result<Vec<String>, RemoteError> {
        let q = format!(
            "{} in parents and name={} and trashed=false",
            quote(parent),
            quote(name)
        );
        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let list = self
                .query(&q, "nextPageToken, files(id)", token.as_deref())
                .await?;
            ids.extend(list.files.into_iter().map(|f| f.id));
            match list.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let request = self
            .api
            .delete(self.files_url(&[id])?)
            .query(&[("supportsAllDrives", "true")]);
        check(request.send().await?).await?;
        Ok(())
    }

    async fn create(
        &self,
        parent: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError> {
        let total = bytes.len();
        let session = self.start_upload(parent, name, mime_type, total).await?;
        let chunk_size = self.api.config().upload_chunk_size.max(1);
        debug!(name, total, chunk_size, "upload session opened");

        let mut start = 0;
        let mut stalls = 0;
        loop {
            let end = (start + chunk_size).min(total);
            let response = self
                .api
                .put(session.clone())
                .header(CONTENT_RANGE, content_range(start, end, total))
                .body(bytes[start..end].to_vec())
                .send()
                .await?;

            if response.status() == StatusCode::PERMANENT_REDIRECT {
                let committed = committed_bytes(
                    response.headers().get(RANGE).and_then(|v| v.to_str().ok()),
                );
                debug!(name, sent = end, committed, "upload chunk acknowledged");
                if committed >= total {
                    return Err(RemoteError::Decode(
                        "upload incomplete after final chunk".into(),
                    ));
                }
                if committed <= start {
                    stalls += 1;
                    if stalls > MAX_UPLOAD_STALLS {
                        return Err(RemoteError::Decode(format!(
                            "upload stalled at byte {committed} of {total}"
                        )));
                    }
                } else {
                    stalls = 0;
                }
                start = committed;
                continue;
            }

            let created: CreatedFile = check(response)
                .await?
                .json()
                .await
                .map_err(|e| RemoteError::Decode(e.to_string()))?;
            info!(name, id = %created.id, "upload complete");
            return Ok(created.id);
        }
    }
}
