//! Asset index: normalised image name → durable reference.
//!
//! The index is rebuilt from a full listing of the image folder on every
//! run and then threaded explicitly into the record fetcher; nothing about
//! it outlives the run that built it.
//!
//! Keys are `normalize(stem) + "." + lowercase(extension)`. A lookup
//! normalises the requested name and probes [`IMAGE_EXTENSIONS`] in order.

use super::normalize::normalize;
use crate::config::GeneratorConfig;
use crate::progress::{LogTag, RunLog};
use crate::remote::{AssetStore, RemoteEntry};
use reqwest::Url;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Extensions probed by [`AssetIndex::lookup`], in priority order.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// In-memory map from normalised asset key to a durable reference.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    entries: HashMap<String, String>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index key for a file name, e.g. `Jane_Doe.PNG` → `jane_doe.png`.
    pub fn key_for(file_name: &str) -> String {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                format!("{}.{}", normalize(stem), ext.to_lowercase())
            }
            _ => normalize(file_name),
        }
    }

    /// Add or replace the reference stored for `file_name`.
    pub fn insert(&mut self, file_name: &str, reference: impl Into<String>) {
        self.entries.insert(Self::key_for(file_name), reference.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reference for `name` without logging.
    pub fn get(&self, name: &str) -> Option<&str> {
        let stem = normalize(name);
        IMAGE_EXTENSIONS
            .iter()
            .find_map(|ext| self.entries.get(&format!("{stem}.{ext}")))
            .map(String::as_str)
    }

    /// Reference for `name`; a miss is logged to the run log.
    pub fn lookup(&self, name: &str, log: &RunLog) -> Option<&str> {
        let found = self.get(name);
        if found.is_none() {
            log.miss(format!("No image found for '{name}'"));
        }
        found
    }

    /// List the image folder (or its `subfolder`) and index every file.
    ///
    /// Never fails: a missing subfolder or any listing error yields an empty
    /// index and a warning, so later lookups simply miss.
    pub async fn build(
        store: &dyn AssetStore,
        folder: &str,
        subfolder: Option<&str>,
        config: &GeneratorConfig,
        log: &RunLog,
    ) -> Self {
        let folder_id = match subfolder {
            None => folder.to_string(),
            Some(name) => match store.find_folder(folder, name).await {
                Ok(Some(entry)) => entry.id,
                Ok(None) => {
                    log.warn(format!(
                        "Image folder '{name}' not found; continuing without images"
                    ));
                    return Self::new();
                }
                Err(e) => {
                    log.warn(format!("Could not look up image folder '{name}': {e}"));
                    return Self::new();
                }
            },
        };

        let files = match list_all(store, &folder_id).await {
            Ok(files) => files,
            Err(e) => {
                log.warn(format!("Could not list images, continuing without them: {e}"));
                return Self::new();
            }
        };

        let mut index = Self::new();
        for entry in &files {
            index.insert(&entry.name, config.image_url(&entry.id));
        }

        if config.mirror_images {
            let dir = config.output_dir.join("images");
            mirror(store, &files, &dir, &mut index, log).await;
        }

        log.ok(format!("Indexed {} images", index.len()));
        index
    }
}

/// Every non-folder child of `folder`, following continuation tokens.
async fn list_all(
    store: &dyn AssetStore,
    folder: &str,
) -> Result<Vec<RemoteEntry>, crate::error::RemoteError> {
    let mut files = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = store.list_children(folder, token.as_deref()).await?;
        debug!(folder, count = page.entries.len(), "listed page");
        files.extend(page.entries.into_iter().filter(|e| !e.is_folder()));
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(files)
}

/// Download image entries into `dir` and point the index at the local copies.
///
/// A file whose local size already equals the remote size is not fetched
/// again. Any per-file failure keeps the remote reference.
async fn mirror(
    store: &dyn AssetStore,
    files: &[RemoteEntry],
    dir: &Path,
    index: &mut AssetIndex,
    log: &RunLog,
) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        log.warn(format!("Could not create {}: {e}", dir.display()));
        return;
    }
    let dir = match tokio::fs::canonicalize(dir).await {
        Ok(d) => d,
        Err(e) => {
            log.warn(format!("Could not resolve {}: {e}", dir.display()));
            return;
        }
    };

    for entry in files.iter().filter(|e| e.is_image()) {
        // Drive names may contain separators; keep only the final component.
        let Some(local_name) = Path::new(&entry.name).file_name() else {
            continue;
        };
        let local = dir.join(local_name);

        let remote_size = store.file_size(&entry.id).await.ok().flatten();
        let local_size = tokio::fs::metadata(&local).await.ok().map(|m| m.len());
        let up_to_date = matches!((local_size, remote_size), (Some(l), Some(r)) if l == r);

        if !up_to_date {
            let bytes = match store.fetch_bytes(&entry.id).await {
                Ok(b) => b,
                Err(e) => {
                    log.warn(format!("Could not download '{}': {e}", entry.name));
                    continue;
                }
            };
            if let Err(e) = write_replacing(&dir, &local, bytes).await {
                log.warn(format!("Could not save '{}': {e}", entry.name));
                continue;
            }
            log.push(LogTag::Download, format!("Downloaded {}", entry.name));
        }

        match Url::from_file_path(&local) {
            Ok(url) => index.insert(&entry.name, url.to_string()),
            Err(()) => warn!(path = %local.display(), "cannot express path as file URL"),
        }
    }
}

/// Write `bytes` to a temp file in `dir`, then rename it over `target`.
///
/// Readers of `target` see either the previous file or the complete new one.
async fn write_replacing(dir: &Path, target: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
    let dir = dir.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryWorkspace;

    fn config() -> GeneratorConfig {
        GeneratorConfig::builder()
            .parent_folder_id("out")
            .image_url_template("https://img.test/{id}")
            .build()
            .unwrap()
    }

    #[test]
    fn keys_normalise_stem_and_lowercase_extension() {
        assert_eq!(AssetIndex::key_for("Jane_Doe.PNG"), "jane_doe.png");
        assert_eq!(AssetIndex::key_for("archive.tar.gz"), "archive.tar.gz");
        assert_eq!(AssetIndex::key_for("README"), "readme");
    }

    #[test]
    fn lookup_probes_extensions_in_order() {
        let mut index = AssetIndex::new();
        index.insert("jane_doe.jpeg", "jpeg-ref");
        index.insert("jane_doe.png", "png-ref");
        index.insert("john_roe.jpg", "jpg-ref");
        assert_eq!(index.get("Jane_Doe"), Some("png-ref"));
        assert_eq!(index.get("JOHN_ROE"), Some("jpg-ref"));
        assert_eq!(index.get("nobody"), None);
    }

    #[test]
    fn gif_is_not_probed() {
        let mut index = AssetIndex::new();
        index.insert("anim.gif", "gif-ref");
        assert_eq!(index.get("anim"), None);
    }

    #[test]
    fn miss_is_logged_not_raised() {
        let index = AssetIndex::new();
        let log = RunLog::default();
        assert!(index.lookup("Ghost", &log).is_none());
        let lines = log.into_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("❌"));
    }

    #[tokio::test]
    async fn build_follows_every_page_and_skips_folders() {
        let ws = MemoryWorkspace::with_page_size(2);
        let a = ws.add_file("imgs", "Jane_Doe.png", "image/png", vec![1]);
        ws.add_file("imgs", "john_roe.jpg", "image/jpeg", vec![2]);
        ws.add_folder("imgs", "nested");
        ws.add_file("imgs", "Zoë_Ng.jpeg", "image/jpeg", vec![3]);

        let log = RunLog::default();
        let index = AssetIndex::build(&ws, "imgs", None, &config(), &log).await;

        assert_eq!(index.len(), 3);
        assert_eq!(ws.list_calls(), 2);
        assert_eq!(index.get("jane_doe").map(str::to_owned), Some(format!("https://img.test/{a}")));
        assert!(index.get("ZOË_NG").is_some());
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_empty() {
        let ws = MemoryWorkspace::new();
        ws.add_file("imgs", "jane_doe.png", "image/png", vec![1]);
        ws.fail_listing(true);

        let log = RunLog::default();
        let index = AssetIndex::build(&ws, "imgs", None, &config(), &log).await;

        assert!(index.is_empty());
        assert!(log.lines().iter().any(|l| l.starts_with("⚠️")));
    }

    #[tokio::test]
    async fn missing_subfolder_degrades_to_empty() {
        let ws = MemoryWorkspace::new();
        ws.add_file("imgs", "jane_doe.png", "image/png", vec![1]);

        let log = RunLog::default();
        let index = AssetIndex::build(&ws, "imgs", Some("2025"), &config(), &log).await;

        assert!(index.is_empty());
        assert!(log.lines()[0].contains("'2025' not found"));
    }

    #[tokio::test]
    async fn subfolder_is_indexed_instead_of_parent() {
        let ws = MemoryWorkspace::new();
        ws.add_file("imgs", "parent_only.png", "image/png", vec![1]);
        let sub = ws.add_folder("imgs", "2025");
        ws.add_file(&sub, "jane_doe.png", "image/png", vec![1]);

        let log = RunLog::default();
        let index = AssetIndex::build(&ws, "imgs", Some("2025"), &config(), &log).await;

        assert!(index.get("jane_doe").is_some());
        assert!(index.get("parent_only").is_none());
    }

    #[tokio::test]
    async fn mirror_downloads_once_and_links_locally() {
        let out = tempfile::tempdir().unwrap();
        let ws = MemoryWorkspace::new();
        ws.add_file("imgs", "jane_doe.png", "image/png", vec![7; 16]);
        let config = GeneratorConfig::builder()
            .parent_folder_id("out")
            .output_dir(out.path())
            .mirror_images(true)
            .build()
            .unwrap();

        let log = RunLog::default();
        let index = AssetIndex::build(&ws, "imgs", None, &config, &log).await;
        let reference = index.get("jane_doe").unwrap().to_owned();
        assert!(reference.starts_with("file://"));
        assert!(out.path().join("images/jane_doe.png").exists());
        assert_eq!(log.lines().iter().filter(|l| l.starts_with("⬇️")).count(), 1);

        let second = RunLog::default();
        AssetIndex::build(&ws, "imgs", None, &config, &second).await;
        assert!(!second.lines().iter().any(|l| l.starts_with("⬇️")));
    }

    #[tokio::test]
    async fn mirror_replaces_stale_copy_without_leftovers() {
        let out = tempfile::tempdir().unwrap();
        let images = out.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("jane_doe.png"), b"half").unwrap();
        let ws = MemoryWorkspace::new();
        ws.add_file("imgs", "jane_doe.png", "image/png", vec![9; 32]);
        let config = GeneratorConfig::builder()
            .parent_folder_id("out")
            .output_dir(out.path())
            .mirror_images(true)
            .build()
            .unwrap();

        let log = RunLog::default();
        AssetIndex::build(&ws, "imgs", None, &config, &log).await;

        assert_eq!(std::fs::read(images.join("jane_doe.png")).unwrap(), vec![9; 32]);
        let names: Vec<_> = std::fs::read_dir(&images)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["jane_doe.png"]);
    }

    #[tokio::test]
    async fn concurrent_mirrors_leave_complete_files() {
        let out = tempfile::tempdir().unwrap();
        let ws = MemoryWorkspace::new();
        for i in 0..8 {
            ws.add_file("imgs", &format!("person_{i}.png"), "image/png", vec![i as u8; 4096]);
        }
        let config = GeneratorConfig::builder()
            .parent_folder_id("out")
            .output_dir(out.path())
            .mirror_images(true)
            .build()
            .unwrap();

        let (a, b) = (RunLog::default(), RunLog::default());
        let (first, second) = tokio::join!(
            AssetIndex::build(&ws, "imgs", None, &config, &a),
            AssetIndex::build(&ws, "imgs", None, &config, &b),
        );

        assert_eq!(first.len(), 8);
        assert_eq!(second.len(), 8);
        let images = out.path().join("images");
        for i in 0..8u8 {
            let bytes = std::fs::read(images.join(format!("person_{i}.png"))).unwrap();
            assert_eq!(bytes, vec![i; 4096]);
        }
        let leftovers = std::fs::read_dir(&images)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".download-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
