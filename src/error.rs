//! Error types for the ocr-batch library.
//!
//! Fatal and non-fatal failures are kept apart:
//!
//! * [`OcrError`] — **Fatal** for one source file: the file cannot be
//!   dispatched at all (missing file, unsupported extension, unreadable PDF,
//!   no OCR engine). Returned as `Err(OcrError)` from
//!   [`crate::batch::process_file`].
//!
//! * [`ItemError`] — **Non-fatal**: a single page or image failed but its
//!   siblings are unaffected. Stored inside [`crate::output::ItemOutcome`].
//!
//! * [`ExtractError`] — **Fatal** for a spreadsheet extraction run (missing
//!   API key, unreadable workbook). Per-cell failures never become an
//!   `ExtractError`; they are written into the cell as an `ERROR:` marker.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a single OCR source file.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The extension is neither `.pdf` nor a supported image type.
    #[error("Unsupported file format: '{path}'\nSupported: .pdf, .png, .jpg, .jpeg, .bmp, .tiff, .tif")]
    UnsupportedFormat { path: PathBuf },

    /// An OCR mode string did not name a known mode.
    #[error("Unsupported OCR mode '{mode}' (expected image_to_string or image_to_data)")]
    UnsupportedMode { mode: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No tesseract binary was found in any candidate location.
    #[error("Tesseract binary not found. Tried: {tried}\nInstall tesseract or pass --tesseract <PATH>.")]
    EngineNotFound { tried: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Rasterisation produced no pages.
    #[error("PDF '{path}' produced no pages")]
    NoPages { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every work item of the file failed.
    #[error("All {total} items failed.\nFirst error: {first_error}")]
    AllItemsFailed { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single work item.
///
/// Stored in [`crate::output::ItemOutcome`]; the batch continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The source image could not be decoded.
    #[error("Could not load image '{path}': {detail}")]
    ImageLoad { path: PathBuf, detail: String },

    /// The OCR engine failed.
    #[error("OCR engine failed: {detail}")]
    Engine { detail: String },

    /// A result file could not be written.
    #[error("Failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },

    /// The worker task panicked or was cancelled.
    #[error("Task failed: {detail}")]
    Task { detail: String },
}

/// Fatal errors for a spreadsheet extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The API key environment variable is unset or empty.
    #[error("Environment variable '{var}' is not set.\nAdd it to your environment or a .env file.")]
    MissingApiKey { var: String },

    /// The workbook could not be opened or parsed.
    #[error("Failed to read workbook '{path}': {detail}")]
    WorkbookRead { path: PathBuf, detail: String },

    /// The workbook could not be saved.
    #[error("Failed to save workbook '{path}': {detail}")]
    WorkbookWrite { path: PathBuf, detail: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to create completion client: {0}")]
    Client(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_items_failed_display() {
        let e = OcrError::AllItemsFailed {
            total: 3,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 items"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_unsupported_mode_display() {
        let e = OcrError::UnsupportedMode {
            mode: "image_to_boxes".into(),
        };
        assert!(e.to_string().contains("image_to_boxes"));
    }

    #[test]
    fn test_item_error_roundtrips_through_serde() {
        let e = ItemError::Engine {
            detail: "exit status 1".into(),
        };
        let json = serde_json::to_string(&e).expect("serialize");
        let back: ItemError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.to_string(), e.to_string());
    }

    #[test]
    fn test_missing_api_key_names_variable() {
        let e = ExtractError::MissingApiKey {
            var: "OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
