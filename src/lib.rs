//! # ocr-batch
//!
//! Batch OCR for PDF and image files, plus LLM-based JSON extraction for
//! spreadsheet cells.
//!
//! ## OCR Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Input     existence check, extension classification (pdf / image)
//!  ├─ 2. Name      <base>/<YYMMDD_HHMMSS>_<stem> output directory
//!  ├─ 3. Render    rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 4. Dispatch  one work item per page / image on a bounded worker pool
//!  ├─ 5. Enhance   grayscale → median → CLAHE → sharpen
//!  ├─ 6. OCR       tesseract: plain text or token table
//!  └─ 7. Write     <prefix>_string.txt | <prefix>_data.{txt,json}, <prefix>_processed.png
//! ```
//!
//! Every item produces an [`ItemOutcome`]; a failed page never aborts its
//! siblings. The batch succeeds when at least one item succeeds.
//!
//! ## Extraction Pipeline Overview
//!
//! ```text
//! workbook.xlsx ─▶ cell tasks (B→C, D→E) ─▶ chat completion ─▶ first JSON object ─▶ save
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_batch::{process_file, OcrConfig, OcrMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder()
//!         .mode(OcrMode::ImageToData)
//!         .workers(4)
//!         .build()?;
//!     let report = process_file("assets/invoice.pdf", &config).await?.into_result()?;
//!     println!("{} items written to {}", report.succeeded, report.output_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-batch` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_file, process_file_sync, process_files, process_pages};
pub use config::{ColumnPair, ExtractionConfig, ExtractionConfigBuilder, OcrConfig, OcrConfigBuilder, OcrMode};
pub use error::{ExtractError, ItemError, OcrError};
pub use extract::{
    client::{CompletionClient, CompletionError, CompletionRequest, OpenAiClient},
    collect_tasks, extract_first_json, fill_cells, process_workbook,
    sheet::{CellGrid, MemoryGrid},
    CellTask,
};
pub use output::{BatchReport, ExtractionReport, ItemOutcome, OcrArtifacts};
pub use pipeline::engine::{OcrEngine, TesseractEngine, Token, TokenTable};
pub use pool::{TaskError, WorkerPool};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
