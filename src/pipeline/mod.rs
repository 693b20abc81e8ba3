//! Pipeline stages for facesheet generation.
//!
//! Each submodule implements one stage and is testable on its own against
//! the in-memory collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! settings ──▶ assets ──▶ records ──▶ render ──▶ paginate ──▶ publish
//! (sheet)      (index)    (grouped)   (HTML)     (PDF)        (Drive)
//! ```
//!
//! 1. [`records::fetch_settings`]: two-column settings worksheet
//! 2. [`assets::AssetIndex::build`]: list the image folder, key by
//!    [`normalize::normalize`]d name; degrades to an empty index
//! 3. [`records::fetch_people`]: roster rows grouped by category, images
//!    resolved through the index
//! 4. [`render::Renderer`]: Handlebars template → HTML
//! 5. [`paginate::Paginator`]: headless browser → PDF, with a bounded wait
//!    for remote images ([`layout`] turns settings into inches; [`engine`]
//!    holds the browser seam)
//! 6. [`publish::Publisher`]: delete-then-create upload; never raises

pub mod assets;
pub mod engine;
pub mod layout;
pub mod normalize;
pub mod paginate;
pub mod publish;
pub mod records;
pub mod render;
