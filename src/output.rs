//! Result types returned by the OCR dispatcher and the extraction pipeline.

use crate::error::{ItemError, OcrError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Files written for one successfully processed work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrArtifacts {
    /// `<prefix>_string.txt` or `<prefix>_data.txt`.
    pub output_file: PathBuf,
    /// `<prefix>_data.json` (data mode only).
    pub json_file: Option<PathBuf>,
    /// `<prefix>_processed.png`, the enhanced bitmap fed to the engine.
    pub processed_image: PathBuf,
    /// `<prefix>_boxes.png` when box annotation is enabled.
    pub annotated_image: Option<PathBuf>,
}

/// Outcome of one work item. Always carries the item's label, whether it
/// succeeded or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Human-readable label, e.g. `page 3` or the image stem.
    pub label: String,
    /// File-name prefix, e.g. `page_003`.
    pub prefix: String,
    pub result: Result<OcrArtifacts, ItemError>,
}

impl ItemOutcome {
    pub fn success(label: impl Into<String>, prefix: impl Into<String>, artifacts: OcrArtifacts) -> Self {
        Self {
            label: label.into(),
            prefix: prefix.into(),
            result: Ok(artifacts),
        }
    }

    pub fn failure(label: impl Into<String>, prefix: impl Into<String>, error: ItemError) -> Self {
        Self {
            label: label.into(),
            prefix: prefix.into(),
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ItemError> {
        self.result.as_ref().err()
    }
}

/// Aggregated result of dispatching one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// The input file.
    pub source: PathBuf,
    /// Directory all items of this source wrote into.
    pub output_dir: PathBuf,
    /// One outcome per work item, in submission order.
    pub outcomes: Vec<ItemOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    /// Build a report from outcomes given in submission order, which for a
    /// PDF is page order.
    pub fn new(source: PathBuf, output_dir: PathBuf, outcomes: Vec<ItemOutcome>, duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        Self {
            source,
            output_dir,
            outcomes,
            succeeded,
            failed,
            duration_ms,
        }
    }

    /// True when at least one item succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    /// Convert an all-failed report into [`OcrError::AllItemsFailed`].
    pub fn into_result(self) -> Result<Self, OcrError> {
        if self.is_success() {
            return Ok(self);
        }
        let first_error = self
            .outcomes
            .iter()
            .find_map(|o| o.error())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no items were processed".to_string());
        Err(OcrError::AllItemsFailed {
            total: self.outcomes.len(),
            first_error,
        })
    }
}

/// Counts from one spreadsheet extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Non-blank source cells submitted.
    pub tasks: usize,
    /// Cells that received a JSON object.
    pub filled: usize,
    /// Cells whose response held no parseable JSON (written as empty).
    pub empty: usize,
    /// Cells that received an `ERROR:` marker.
    pub errors: usize,
}
