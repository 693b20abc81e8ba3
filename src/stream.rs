//! Streaming generation API: progress lines as a `Stream`.
//!
//! [`generate_stream`] runs the pipeline on a spawned task and hands back
//! the live progress lines as they are logged, plus a join handle for the
//! final [`GenerationResult`]. The stream ends when the run reaches a
//! terminal state; dropping it early does not cancel or slow the run.

use crate::generate::Generator;
use crate::output::GenerationResult;
use crate::progress::{GenerationProgressCallback, ProgressCallback, ProgressEvent, Stage};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// A boxed stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Forwards events to the stream and to the configured callback, if any.
struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressEvent>,
    inner: Option<ProgressCallback>,
}

impl GenerationProgressCallback for ChannelProgress {
    fn on_stage(&self, stage: Stage) {
        if let Some(ref cb) = self.inner {
            cb.on_stage(stage);
        }
    }

    fn on_message(&self, event: &ProgressEvent) {
        // Err only means the receiver was dropped.
        let _ = self.sender.send(event.clone());
        if let Some(ref cb) = self.inner {
            cb.on_message(event);
        }
    }
}

/// Start a generation and stream its progress.
///
/// Must be called from within a Tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use facesheet::{generate_stream, Generator, GeneratorConfig, GoogleConfig};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GeneratorConfig::builder().parent_folder_id("1AbC").build()?;
/// let generator = Arc::new(Generator::google(config, GoogleConfig::new("ya29.token"))?);
/// let (mut events, result) = generate_stream(generator, "me@example.org", "1SheetId");
/// while let Some(event) = events.next().await {
///     println!("{}", event.message);
/// }
/// println!("{:?}", result.await?.status);
/// # Ok(())
/// # }
/// ```
pub fn generate_stream(
    generator: Arc<Generator>,
    identity: impl Into<String>,
    sheet: impl Into<String>,
) -> (ProgressStream, JoinHandle<GenerationResult>) {
    let identity = identity.into();
    let sheet = sheet.into();
    let (sender, receiver) = mpsc::unbounded_channel();
    let callback: ProgressCallback = Arc::new(ChannelProgress {
        sender,
        inner: generator.config().progress_callback.clone(),
    });

    let handle = tokio::spawn(async move {
        generator
            .generate_with(&identity, &sheet, Some(callback))
            .await
    });

    (Box::pin(UnboundedReceiverStream::new(receiver)), handle)
}
