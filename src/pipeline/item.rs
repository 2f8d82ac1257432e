//! Single work item: load → enhance → recognise → write.
//!
//! [`process_item`] never returns an error. Every failure is folded into the
//! [`ItemOutcome`] together with the item's label, so one bad page cannot
//! take down its siblings.

use crate::config::OcrMode;
use crate::error::ItemError;
use crate::output::{ItemOutcome, OcrArtifacts};
use crate::pipeline::engine::{OcrEngine, OcrPayload};
use crate::pipeline::{enhance, write};
use image::DynamicImage;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where a work item's pixels come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image file, decoded inside the worker.
    Path(PathBuf),
    /// An already rasterised PDF page.
    Bitmap(DynamicImage),
}

/// One unit of OCR work: a page or a single image file.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub source: ImageSource,
    pub dest_dir: PathBuf,
    pub label: String,
    pub prefix: String,
}

/// Per-run settings shared by every item of a batch.
#[derive(Debug, Clone, Copy)]
pub struct ItemSettings {
    pub mode: OcrMode,
    pub min_confidence: f32,
    pub annotate_boxes: bool,
}

/// Run one item to completion.
pub fn process_item(item: WorkItem, engine: &dyn OcrEngine, settings: ItemSettings) -> ItemOutcome {
    let WorkItem {
        source,
        dest_dir,
        label,
        prefix,
    } = item;

    match run(source, &dest_dir, &label, &prefix, engine, settings) {
        Ok(artifacts) => {
            debug!("{} → {}", label, artifacts.output_file.display());
            ItemOutcome::success(label, prefix, artifacts)
        }
        Err(e) => {
            warn!("{} failed: {}", label, e);
            ItemOutcome::failure(label, prefix, e)
        }
    }
}

fn run(
    source: ImageSource,
    dest_dir: &std::path::Path,
    label: &str,
    prefix: &str,
    engine: &dyn OcrEngine,
    settings: ItemSettings,
) -> Result<OcrArtifacts, ItemError> {
    std::fs::create_dir_all(dest_dir).map_err(|e| ItemError::Write {
        path: dest_dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let image = match source {
        ImageSource::Path(path) => image::open(&path).map_err(|e| ItemError::ImageLoad {
            path: path.clone(),
            detail: e.to_string(),
        })?,
        ImageSource::Bitmap(image) => image,
    };

    let enhanced = enhance::enhance(&image);
    drop(image);

    let payload = match settings.mode {
        OcrMode::ImageToString => engine.image_to_string(&enhanced).map(OcrPayload::Text),
        OcrMode::ImageToData => engine.image_to_data(&enhanced).map(OcrPayload::Data),
    }
    .map_err(|e| ItemError::Engine {
        detail: e.to_string(),
    })?;

    let (output_file, json_file, annotated_image) = match &payload {
        OcrPayload::Text(text) => (
            write::write_string_result(dest_dir, prefix, label, text)?,
            None,
            None,
        ),
        OcrPayload::Data(table) => {
            let (txt, json) =
                write::write_data_result(dest_dir, prefix, label, table, settings.min_confidence)?;
            let boxes = if settings.annotate_boxes {
                Some(write::save_boxes(
                    dest_dir,
                    prefix,
                    &enhanced,
                    table,
                    settings.min_confidence,
                )?)
            } else {
                None
            };
            (txt, Some(json), boxes)
        }
    };

    let processed_image = write::save_processed(dest_dir, prefix, &enhanced)?;

    Ok(OcrArtifacts {
        output_file,
        json_file,
        processed_image,
        annotated_image,
    })
}
