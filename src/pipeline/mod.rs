//! Pipeline stages for OCR batches.
//!
//! Each submodule implements one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ item: enhance ──▶ engine ──▶ write
//! (classify) (pdfium)       (CLAHE etc.)  (tesseract) (txt/json/png)
//! ```
//!
//! 1. [`input`]   — existence check and extension-based classification
//! 2. [`render`]  — rasterise every PDF page; runs in `spawn_blocking`
//! 3. [`item`]    — one work item end to end, failures folded into the outcome
//! 4. [`enhance`] — grayscale, median, CLAHE, sharpen
//! 5. [`engine`]  — the `OcrEngine` seam and the tesseract CLI engine
//! 6. [`write`]   — result files for one item

pub mod engine;
pub mod enhance;
pub mod input;
pub mod item;
pub mod render;
pub mod write;
