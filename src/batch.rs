//! Batch dispatch: one source file in, one [`BatchReport`] out.
//!
//! A PDF fans out into one work item per page; an image is a single item.
//! Items run on a [`WorkerPool`] of `config.workers` slots, each on tokio's
//! blocking pool. A failing item never cancels its siblings, and the file
//! only fails as a whole when it cannot be dispatched at all.

use crate::config::OcrConfig;
use crate::error::{ItemError, OcrError};
use crate::naming;
use crate::output::{BatchReport, ItemOutcome};
use crate::pipeline::engine::{OcrEngine, TesseractEngine};
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::item::{process_item, ImageSource, ItemSettings, WorkItem};
use crate::pipeline::render;
use crate::pool::WorkerPool;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// OCR one PDF or image file.
///
/// # Returns
/// `Ok(BatchReport)` once every item has finished, even if some failed.
/// Use [`BatchReport::into_result`] to treat an all-failed batch as an error.
///
/// # Errors
/// Returns `Err(OcrError)` only when nothing could be dispatched:
/// - the file does not exist or has an unsupported extension
/// - no tesseract binary could be found
/// - the PDF cannot be opened or rendered, or has no pages
pub async fn process_file(
    path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<BatchReport, OcrError> {
    let start = Instant::now();
    let path = path.as_ref();
    info!("Processing {}", path.display());

    // ── Step 1: Validate ────────────────────────────────────────────────
    if !path.exists() {
        return Err(OcrError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let output_dir = naming::output_directory(path, &config.output_base);
    let kind = input::validate(path)?;

    // ── Step 2: Resolve the engine before any rendering ─────────────────
    let engine = resolve_engine(config)?;

    // ── Step 3: Build work items ────────────────────────────────────────
    let items = match kind {
        InputKind::Pdf => {
            let pages =
                render::rasterize(path, config.dpi, config.max_rendered_pixels, config.password.as_deref())
                    .await?;
            info!("Rasterised {} pages at {} DPI", pages.len(), config.dpi);
            page_items(pages, &output_dir)
        }
        InputKind::Image => {
            let stem = naming::file_stem(path);
            vec![WorkItem {
                source: ImageSource::Path(path.to_path_buf()),
                dest_dir: output_dir.clone(),
                label: stem.clone(),
                prefix: stem,
            }]
        }
    };

    // ── Step 4: Dispatch ────────────────────────────────────────────────
    Ok(run_items(path, output_dir, items, engine, config, start).await)
}

/// OCR pages that were already rasterised, e.g. by another renderer.
///
/// Pages are numbered in the order given. Results go to the output
/// directory named after `source`.
pub async fn process_pages(
    source: impl AsRef<Path>,
    pages: Vec<DynamicImage>,
    config: &OcrConfig,
) -> Result<BatchReport, OcrError> {
    let start = Instant::now();
    let source = source.as_ref();
    if pages.is_empty() {
        return Err(OcrError::NoPages {
            path: source.to_path_buf(),
        });
    }
    let engine = resolve_engine(config)?;
    let output_dir = naming::output_directory(source, &config.output_base);
    let items = page_items(pages, &output_dir);
    Ok(run_items(source, output_dir, items, engine, config, start).await)
}

/// Process several files one after another.
///
/// Each entry is independent: a fatal error for one file is returned in its
/// slot and the next file is still processed.
pub async fn process_files<P>(paths: &[P], config: &OcrConfig) -> Vec<(PathBuf, Result<BatchReport, OcrError>)>
where
    P: AsRef<Path>,
{
    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let result = process_file(path, config).await;
        if let Err(ref e) = result {
            warn!("Skipping {}: {}", path.display(), e);
        }
        results.push((path.to_path_buf(), result));
    }
    results
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(path: impl AsRef<Path>, config: &OcrConfig) -> Result<BatchReport, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_file(path, config))
}

/// File-name prefix for a 1-based page number: `page_001`.
pub fn page_prefix(page_num: usize) -> String {
    format!("page_{:03}", page_num)
}

/// Pick the OCR engine: an injected one first, then tesseract.
fn resolve_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
    if let Some(ref engine) = config.engine {
        return Ok(Arc::clone(engine));
    }
    let engine = TesseractEngine::resolve(config.tesseract_path.as_deref(), &config.language)?;
    Ok(Arc::new(engine))
}

/// One work item per page: label `page N`, prefix `page_NNN`.
fn page_items(pages: Vec<DynamicImage>, output_dir: &Path) -> Vec<WorkItem> {
    pages
        .into_iter()
        .enumerate()
        .map(|(idx, page)| WorkItem {
            source: ImageSource::Bitmap(page),
            dest_dir: output_dir.to_path_buf(),
            label: format!("page {}", idx + 1),
            prefix: page_prefix(idx + 1),
        })
        .collect()
}

async fn run_items(
    source: &Path,
    output_dir: PathBuf,
    items: Vec<WorkItem>,
    engine: Arc<dyn OcrEngine>,
    config: &OcrConfig,
    start: Instant,
) -> BatchReport {
    let outcomes = dispatch(source, items, engine, config).await;
    let report = BatchReport::new(
        source.to_path_buf(),
        output_dir,
        outcomes,
        start.elapsed().as_millis() as u64,
    );
    info!(
        "Finished {}: {}/{} items succeeded in {}ms → {}",
        source.display(),
        report.succeeded,
        report.outcomes.len(),
        report.duration_ms,
        report.output_dir.display()
    );
    report
}

async fn dispatch(
    source: &Path,
    items: Vec<WorkItem>,
    engine: Arc<dyn OcrEngine>,
    config: &OcrConfig,
) -> Vec<ItemOutcome> {
    let total = items.len();
    let settings = ItemSettings {
        mode: config.mode,
        min_confidence: config.min_confidence,
        annotate_boxes: config.annotate_boxes,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(&source.display().to_string(), total);
    }

    let pool = WorkerPool::with_cancellation(config.workers, config.cancellation.clone());
    debug!("Dispatching {} items on {} workers", total, pool.workers());
    let mut tasks = pool.batch::<(usize, String, String), ItemOutcome>();
    for (index, item) in items.into_iter().enumerate() {
        let key = (index, item.label.clone(), item.prefix.clone());
        let engine = Arc::clone(&engine);
        tasks.spawn_blocking(key, move || process_item(item, engine.as_ref(), settings));
    }

    // Slots are filled in completion order and read back in submission order.
    let mut slots: Vec<Option<ItemOutcome>> = vec![None; total];
    while let Some(((index, label, prefix), result)) = tasks.next_completed().await {
        let outcome = result.unwrap_or_else(|e| {
            warn!("{} did not finish: {}", label, e);
            ItemOutcome::failure(
                label,
                prefix,
                ItemError::Task {
                    detail: e.to_string(),
                },
            )
        });
        if let Some(ref cb) = config.progress_callback {
            match outcome.error() {
                None => cb.on_item_complete(&outcome.label, total),
                Some(e) => cb.on_item_error(&outcome.label, total, &e.to_string()),
            }
        }
        slots[index] = Some(outcome);
    }
    let outcomes: Vec<ItemOutcome> = slots.into_iter().flatten().collect();

    if let Some(ref cb) = config.progress_callback {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        cb.on_batch_complete(total, succeeded);
    }
    outcomes
}
