//! Live progress reporting and the accumulated run log.
//!
//! Every human-readable line the pipeline produces goes through a
//! [`RunLog`]. The log keeps the lines for the final
//! [`crate::output::GenerationResult`], mirrors them to `tracing`, and
//! forwards each one to an optional [`GenerationProgressCallback`] so a
//! caller can stream them to a WebSocket, a terminal spinner, or a
//! [`BroadcastProgress`] channel.
//!
//! # Example
//!
//! ```rust
//! use facesheet::{GenerationProgressCallback, ProgressEvent};
//! use std::sync::{Arc, Mutex};
//!
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl GenerationProgressCallback for Collect {
//!     fn on_message(&self, event: &ProgressEvent) {
//!         self.0.lock().unwrap().push(event.message.clone());
//!     }
//! }
//!
//! let cb = Arc::new(Collect(Mutex::new(Vec::new())));
//! let config = facesheet::GeneratorConfig::builder()
//!     .parent_folder_id("folder")
//!     .progress_callback(cb as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One line on the live progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
}

/// Pipeline states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Started,
    SettingsFetched,
    ImagesIndexed,
    RecordsGrouped,
    Rendered,
    Paginated,
    Published,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Started => "started",
            Stage::SettingsFetched => "settings fetched",
            Stage::ImagesIndexed => "images indexed",
            Stage::RecordsGrouped => "records grouped",
            Stage::Rendered => "rendered",
            Stage::Paginated => "paginated",
            Stage::Published => "published",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tag of a run-log line; decides its glyph and its `tracing` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Start,
    Progress,
    Ok,
    Warn,
    Miss,
    Delete,
    Download,
    Document,
    Fatal,
    Done,
}

impl LogTag {
    pub fn glyph(self) -> &'static str {
        match self {
            LogTag::Start => "👤",
            LogTag::Progress => "🔄",
            LogTag::Ok => "✅",
            LogTag::Warn => "⚠️",
            LogTag::Miss => "❌",
            LogTag::Delete => "🗑️",
            LogTag::Download => "⬇️",
            LogTag::Document => "📄",
            LogTag::Fatal => "🔥",
            LogTag::Done => "🎉",
        }
    }
}

/// Receives progress from a running generation.
///
/// All methods default to no-ops. Implementations must be `Send + Sync`:
/// the streaming API drives the pipeline on a spawned task.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called on every state transition.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called for every run-log line, in order.
    fn on_message(&self, event: &ProgressEvent) {
        let _ = event;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

/// Fans progress lines out to any number of live listeners.
///
/// Sending never blocks and never fails the pipeline: with no subscriber the
/// event is dropped, and a lagging subscriber loses the oldest events.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl GenerationProgressCallback for BroadcastProgress {
    fn on_message(&self, event: &ProgressEvent) {
        // Err only means nobody is listening right now.
        let _ = self.sender.send(event.clone());
    }
}

/// Ordered, glyph-tagged log of one generation run.
pub struct RunLog {
    lines: Mutex<Vec<String>>,
    callback: Option<ProgressCallback>,
}

impl RunLog {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            callback,
        }
    }

    /// Append a line, mirror it to `tracing` and the progress callback.
    pub fn push(&self, tag: LogTag, message: impl AsRef<str>) {
        let line = format!("{} {}", tag.glyph(), message.as_ref());
        match tag {
            LogTag::Warn | LogTag::Miss | LogTag::Fatal => warn!("{}", line),
            LogTag::Progress | LogTag::Download => debug!("{}", line),
            _ => info!("{}", line),
        }
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.clone());
        if let Some(ref cb) = self.callback {
            cb.on_message(&ProgressEvent { message: line });
        }
    }

    pub fn stage(&self, stage: Stage) {
        debug!(%stage, "stage transition");
        if let Some(ref cb) = self.callback {
            cb.on_stage(stage);
        }
    }

    pub fn start(&self, message: impl AsRef<str>) {
        self.push(LogTag::Start, message)
    }

    pub fn progress(&self, message: impl AsRef<str>) {
        self.push(LogTag::Progress, message)
    }

    pub fn ok(&self, message: impl AsRef<str>) {
        self.push(LogTag::Ok, message)
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.push(LogTag::Warn, message)
    }

    pub fn miss(&self, message: impl AsRef<str>) {
        self.push(LogTag::Miss, message)
    }

    pub fn fatal(&self, message: impl AsRef<str>) {
        self.push(LogTag::Fatal, message)
    }

    /// Snapshot of the lines logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new(None)
    }
}
