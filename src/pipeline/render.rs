//! HTML rendering of the grouped roster through Handlebars.
//!
//! The `facesheet.html` template is compiled into the library. A template
//! directory, when configured, is registered on top: its `*.html` / `*.hbs`
//! files are named by file name and may override the embedded one.
//!
//! Strict mode is on, so a template referencing a key the context lacks is
//! an error rather than an empty string.

use super::records::{CategoryGroup, GroupedRecords, Settings};
use crate::config::DEFAULT_TEMPLATE_NAME;
use crate::error::GenerateError;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

const EMBEDDED_TEMPLATE: &str = include_str!("../../templates/facesheet.html");

/// Everything a template can see.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    /// Spreadsheet title.
    pub title: &'a str,
    pub settings: &'a Settings,
    pub groups: Vec<CategoryGroup<'a>>,
    /// Confirmed identity of the caller.
    pub identity: &'a str,
    /// Resolved logo reference, `null` when the logo was not found.
    pub logo: Option<&'a str>,
    pub generated_at: String,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        title: &'a str,
        settings: &'a Settings,
        people: &'a GroupedRecords,
        identity: &'a str,
        logo: Option<&'a str>,
    ) -> Self {
        Self {
            title,
            settings,
            groups: people.groups(),
            identity,
            logo,
            generated_at: chrono::Utc::now().format("%d %b %Y, %H:%M UTC").to_string(),
        }
    }
}

/// Registry of compiled templates.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Register the embedded template, then every template in `template_dir`.
    ///
    /// Reads the directory with blocking I/O; called once while building a
    /// `Generator`, outside any run.
    pub fn new(template_dir: Option<&Path>) -> Result<Self, GenerateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry
            .register_template_string(DEFAULT_TEMPLATE_NAME, EMBEDDED_TEMPLATE)
            .map_err(|e| GenerateError::TemplateRender(e.to_string()))?;

        if let Some(dir) = template_dir {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                GenerateError::InvalidConfig(format!(
                    "Cannot read template directory {}: {e}",
                    dir.display()
                ))
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                let is_template = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("html" | "hbs")
                );
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !is_template || !path.is_file() {
                    continue;
                }
                registry
                    .register_template_file(name, &path)
                    .map_err(|e| GenerateError::TemplateRender(format!("{name}: {e}")))?;
                debug!(template = name, "registered template");
            }
        }

        Ok(Self { registry })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render `template_name` against `context`.
    pub fn render(&self, template_name: &str, context: &RenderContext<'_>) -> Result<String, GenerateError> {
        if !self.registry.has_template(template_name) {
            return Err(GenerateError::TemplateNotFound {
                name: template_name.to_string(),
            });
        }
        self.registry
            .render(template_name, context)
            .map_err(|e| GenerateError::TemplateRender(e.to_string()))
    }
}
