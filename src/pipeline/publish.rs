//! Publisher: replace-by-name upload of the finished document.
//!
//! Earlier copies with the same name are deleted first, best-effort; a failed
//! delete only means a duplicate survives next to the new upload. Nothing
//! here returns an error: every failure is logged and reported as `None`.

use crate::config::GeneratorConfig;
use crate::progress::{LogTag, RunLog};
use crate::remote::ObjectStore;
use std::path::Path;
use tracing::debug;

/// The uploaded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    pub id: String,
    pub link: String,
}

pub struct Publisher<'a> {
    store: &'a dyn ObjectStore,
    config: &'a GeneratorConfig,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a GeneratorConfig) -> Self {
        Self { store, config }
    }

    /// Upload `local_path` as `remote_name` under `parent_folder`.
    pub async fn publish(
        &self,
        local_path: &Path,
        remote_name: &str,
        parent_folder: &str,
        mime_type: &str,
        log: &RunLog,
    ) -> Option<PublishedFile> {
        let bytes = match tokio::fs::read(local_path).await {
            Ok(b) => b,
            Err(e) => {
                log.miss(format!("Could not read {}: {e}", local_path.display()));
                return None;
            }
        };

        let existing = match self.store.find_by_name(parent_folder, remote_name).await {
            Ok(ids) => ids,
            Err(e) => {
                log.miss(format!("Could not check for an existing '{remote_name}': {e}"));
                return None;
            }
        };
        for id in existing {
            match self.store.delete(&id).await {
                Ok(()) => log.push(LogTag::Delete, format!("Deleted previous '{remote_name}' ({id})")),
                Err(e) => log.warn(format!("Could not delete previous '{remote_name}' ({id}): {e}")),
            }
        }

        log.progress(format!("Uploading '{remote_name}' ({} bytes)", bytes.len()));
        match self
            .store
            .create(parent_folder, remote_name, mime_type, bytes)
            .await
        {
            Ok(id) => {
                let link = self.config.viewer_link(&id);
                debug!(%id, %link, "published");
                log.ok(format!("Uploaded '{remote_name}'"));
                Some(PublishedFile { id, link })
            }
            Err(e) => {
                log.miss(format!("Upload of '{remote_name}' failed: {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryWorkspace;
    use crate::remote::PDF_MIME;

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, GeneratorConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Roster.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let config = GeneratorConfig::builder()
            .parent_folder_id("out")
            .build()
            .unwrap();
        (dir, path, config)
    }

    #[tokio::test]
    async fn publishing_twice_leaves_one_live_entry() {
        let (_dir, path, config) = setup();
        let ws = MemoryWorkspace::new();
        let publisher = Publisher::new(&ws, &config);
        let log = RunLog::default();

        let first = publisher
            .publish(&path, "Roster.pdf", "out", PDF_MIME, &log)
            .await
            .unwrap();
        let second = publisher
            .publish(&path, "Roster.pdf", "out", PDF_MIME, &log)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(ws.files_named("out", "Roster.pdf"), vec![second.id.clone()]);
        assert_eq!(second.link, format!("https://drive.google.com/file/d/{}/view", second.id));
        assert!(log.lines().iter().any(|l| l.starts_with("🗑️")));
    }

    #[tokio::test]
    async fn failed_delete_still_uploads() {
        let (_dir, path, config) = setup();
        let ws = MemoryWorkspace::new();
        ws.add_file("out", "Roster.pdf", PDF_MIME, vec![1]);
        ws.fail_delete(true);
        let log = RunLog::default();

        let published = Publisher::new(&ws, &config)
            .publish(&path, "Roster.pdf", "out", PDF_MIME, &log)
            .await;

        assert!(published.is_some());
        assert_eq!(ws.files_named("out", "Roster.pdf").len(), 2);
        assert!(log.lines().iter().any(|l| l.starts_with("⚠️")));
    }

    #[tokio::test]
    async fn failed_create_reports_none() {
        let (_dir, path, config) = setup();
        let ws = MemoryWorkspace::new();
        ws.fail_create(true);
        let log = RunLog::default();

        let published = Publisher::new(&ws, &config)
            .publish(&path, "Roster.pdf", "out", PDF_MIME, &log)
            .await;

        assert!(published.is_none());
        assert!(log.lines().last().unwrap().starts_with("❌"));
    }

    #[tokio::test]
    async fn missing_local_file_reports_none() {
        let (dir, _path, config) = setup();
        let ws = MemoryWorkspace::new();
        let published = Publisher::new(&ws, &config)
            .publish(&dir.path().join("absent.pdf"), "absent.pdf", "out", PDF_MIME, &RunLog::default())
            .await;
        assert!(published.is_none());
        assert!(ws.files_named("out", "absent.pdf").is_empty());
    }
}
