//! # facesheet
//!
//! Turn a roster spreadsheet and a folder of portraits into a printable
//! facesheet PDF, and publish it back to Drive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! identity + sheet id
//!  │
//!  ├─ 1. Settings  two-column worksheet (page size, margins, logo, …)
//!  ├─ 2. Images    list the image folder, key by normalised name
//!  ├─ 3. People    roster rows grouped by category, photos resolved
//!  ├─ 4. Render    Handlebars template → HTML
//!  ├─ 5. Paginate  headless Chromium → PDF (bounded wait for remote images)
//!  └─ 6. Publish   delete-then-create upload, viewer link returned
//! ```
//!
//! Every step appends a glyph-tagged line to the run log, which is streamed
//! live to an optional [`GenerationProgressCallback`] and returned in the
//! final [`GenerationResult`]. A run never panics or returns a bare error:
//! failures come back as `status: Error` with the log up to that point.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use facesheet::{Generator, GeneratorConfig, GoogleConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::builder()
//!         .parent_folder_id("1PublishFolder")
//!         .image_folder_id("1ImageFolder")
//!         .build()?;
//!     let token = std::env::var("GOOGLE_ACCESS_TOKEN")?;
//!     let generator = Generator::google(config, GoogleConfig::new(token))?;
//!
//!     let result = generator.generate("me@example.org", "1SpreadsheetId").await;
//!     for line in &result.log {
//!         println!("{line}");
//!     }
//!     println!("{:?}", result.pdf_link);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `facesheet` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! facesheet = { version = "0.3", default-features = false }
//! ```
//!
//! ## Collaborators
//!
//! The pipeline reaches the outside world only through the traits in
//! [`remote`] and [`pipeline::engine`]. [`Generator::google`] wires the
//! Google REST clients and headless Chromium; tests and offline runs use
//! [`remote::memory::MemoryWorkspace`] and their own [`RenderEngine`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod remote;
pub mod retry;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder, GoogleConfig};
pub use error::{ErrorKind, GenerateError, RemoteError};
pub use generate::{Generator, Services};
pub use output::{GenerationResult, GenerationStatus};
pub use pipeline::engine::{ChromiumEngine, RenderEngine, RenderSession};
pub use pipeline::records::{GroupedRecords, PersonRecord, Settings};
pub use progress::{
    BroadcastProgress, GenerationProgressCallback, NoopProgressCallback, ProgressCallback,
    ProgressEvent, Stage,
};
pub use stream::{generate_stream, ProgressStream};
