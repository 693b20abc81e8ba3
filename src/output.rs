//! Output types returned by a generation run.

use crate::pipeline::records::GroupedRecords;
use serde::{Deserialize, Serialize};

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    Success,
    Error,
}

/// The single payload a caller receives once a run reaches a terminal state.
///
/// A `GenerationResult` is always well formed: failures are reported through
/// `status` / `error` and the accumulated `log`, never as a panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub status: GenerationStatus,

    /// Viewer link of the published PDF (success only).
    pub pdf_link: Option<String>,

    /// Wall-clock seconds from start to terminal state.
    pub duration: Option<f64>,

    /// Human-readable cause of failure (error only).
    pub error: Option<String>,

    /// Every progress line emitted during the run, in order.
    pub log: Vec<String>,

    /// The grouped roster the document was rendered from, when the run got
    /// that far. Kept out of the serialised payload.
    #[serde(skip)]
    pub people: Option<GroupedRecords>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_without_people() {
        let result = GenerationResult {
            status: GenerationStatus::Error,
            pdf_link: None,
            duration: Some(1.5),
            error: Some("🔥 boom".into()),
            log: vec!["👤 Starting generation for a@b.org".into()],
            people: Some(GroupedRecords::default()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "Error");
        assert!(json.get("people").is_none());
        assert_eq!(json["log"].as_array().unwrap().len(), 1);
    }
}
