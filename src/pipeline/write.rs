//! Result writers for one work item.
//!
//! All files land in the item's destination directory and are named from
//! its prefix: `<prefix>_string.txt`, `<prefix>_data.txt`,
//! `<prefix>_data.json`, `<prefix>_processed.png`, `<prefix>_boxes.png`.

use crate::error::ItemError;
use crate::pipeline::engine::TokenTable;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const BOX_COLOUR: Rgb<u8> = Rgb([0, 200, 0]);

/// Write the text-mode result and return its path.
pub fn write_string_result(
    dest: &Path,
    prefix: &str,
    label: &str,
    text: &str,
) -> Result<PathBuf, ItemError> {
    let path = dest.join(format!("{prefix}_string.txt"));
    let body = format!("=== {label} OCR result (image_to_string) ===\n\n{text}");
    write_file(&path, body.as_bytes())?;
    Ok(path)
}

/// Write the data-mode JSON table and its readable summary.
///
/// Returns `(summary_path, json_path)`.
pub fn write_data_result(
    dest: &Path,
    prefix: &str,
    label: &str,
    table: &TokenTable,
    min_confidence: f32,
) -> Result<(PathBuf, PathBuf), ItemError> {
    let json_path = dest.join(format!("{prefix}_data.json"));
    let json = serde_json::to_string_pretty(table).map_err(|e| ItemError::Write {
        path: json_path.clone(),
        detail: e.to_string(),
    })?;
    write_file(&json_path, json.as_bytes())?;

    let txt_path = dest.join(format!("{prefix}_data.txt"));
    let summary = format_data_summary(label, table, min_confidence, &json_path);
    write_file(&txt_path, summary.as_bytes())?;

    Ok((txt_path, json_path))
}

/// Readable data-mode summary: extracted tokens, then table statistics.
pub fn format_data_summary(
    label: &str,
    table: &TokenTable,
    min_confidence: f32,
    json_path: &Path,
) -> String {
    let extracted: Vec<String> = table
        .extracted(min_confidence)
        .map(|t| format!("[confidence: {}] {}", t.conf, t.text))
        .collect();

    let mut out = format!("=== {label} OCR result (image_to_data) ===\n\n");
    out.push_str(&format!("=== Extracted text (confidence > {min_confidence}) ===\n"));
    out.push_str(&extracted.join("\n"));
    out.push_str("\n\n=== Details ===\n");
    out.push_str(&format!("Total tokens: {}\n", table.len()));
    out.push_str(&format!("Mean confidence: {:.2}\n", table.mean_confidence()));
    out.push_str(&format!("Full data: {}\n", json_path.display()));
    out
}

/// Save the enhanced bitmap fed to the engine.
pub fn save_processed(dest: &Path, prefix: &str, image: &GrayImage) -> Result<PathBuf, ItemError> {
    let path = dest.join(format!("{prefix}_processed.png"));
    save_png(image, &path)?;
    Ok(path)
}

/// Draw the extracted tokens' bounding boxes on an RGB copy and save it.
pub fn save_boxes(
    dest: &Path,
    prefix: &str,
    image: &GrayImage,
    table: &TokenTable,
    min_confidence: f32,
) -> Result<PathBuf, ItemError> {
    let mut canvas = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
    for token in table.extracted(min_confidence) {
        if token.width > 0 && token.height > 0 {
            let rect = Rect::at(token.left, token.top).of_size(token.width as u32, token.height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOUR);
        }
    }
    let path = dest.join(format!("{prefix}_boxes.png"));
    save_png(&canvas, &path)?;
    Ok(path)
}

fn save_png<P>(image: &image::ImageBuffer<P, Vec<u8>>, path: &Path) -> Result<(), ItemError>
where
    P: image::PixelWithColorType<Subpixel = u8>,
{
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| ItemError::Write {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ItemError> {
    std::fs::write(path, contents).map_err(|e| ItemError::Write {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::engine::Token;
    use image::Luma;

    fn token(conf: f32, text: &str, left: i32) -> Token {
        Token {
            level: 5,
            page_num: 1,
            block_num: 1,
            par_num: 1,
            line_num: 1,
            word_num: 1,
            left,
            top: 2,
            width: 5,
            height: 4,
            conf,
            text: text.to_string(),
        }
    }

    fn sample_table() -> TokenTable {
        TokenTable::new(vec![
            token(-1.0, "", 0),
            token(0.0, "foo", 1),
            token(55.0, "bar", 2),
            token(91.0, "baz", 3),
        ])
    }

    #[test]
    fn test_summary_lists_only_confident_tokens() {
        let text = format_data_summary("page 1", &sample_table(), 0.0, Path::new("out/page_001_data.json"));
        assert!(text.starts_with("=== page 1 OCR result (image_to_data) ===\n\n"));
        assert!(text.contains("[confidence: 55] bar\n[confidence: 91] baz"));
        assert!(!text.contains("foo"));
        assert!(text.contains("Total tokens: 4"));
        assert!(text.contains("Mean confidence: 36.25"));
        assert!(text.contains("Full data: out/page_001_data.json"));
    }

    #[test]
    fn test_summary_full_layout() {
        let text = format_data_summary("page 1", &sample_table(), 60.0, Path::new("p_data.json"));
        assert_eq!(
            text,
            "=== page 1 OCR result (image_to_data) ===\n\n\
=== Extracted text (confidence > 60) ===\n\
[confidence: 91] baz\n\n\
=== Details ===\n\
Total tokens: 4\n\
Mean confidence: 36.25\n\
Full data: p_data.json\n"
        );
    }

    #[test]
    fn test_summary_empty_table() {
        let text = format_data_summary("x", &TokenTable::default(), 0.0, Path::new("x_data.json"));
        assert!(text.contains("Total tokens: 0"));
        assert!(text.contains("Mean confidence: 0.00"));
    }

    #[test]
    fn test_writes_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let string_path = write_string_result(dir.path(), "scan", "scan", "hello").unwrap();
        assert_eq!(string_path.file_name().unwrap(), "scan_string.txt");
        let body = std::fs::read_to_string(&string_path).unwrap();
        assert_eq!(body, "=== scan OCR result (image_to_string) ===\n\nhello");

        let (txt, json) = write_data_result(dir.path(), "page_002", "page 2", &sample_table(), 0.0).unwrap();
        assert_eq!(txt.file_name().unwrap(), "page_002_data.txt");
        assert_eq!(json.file_name().unwrap(), "page_002_data.json");
        let parsed: TokenTable = serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(parsed, sample_table());
    }

    #[test]
    fn test_boxes_and_processed_png() {
        let dir = tempfile::tempdir().unwrap();
        let gray = GrayImage::from_pixel(20, 10, Luma([255]));
        let processed = save_processed(dir.path(), "p", &gray).unwrap();
        let boxes = save_boxes(dir.path(), "p", &gray, &sample_table(), 0.0).unwrap();
        assert!(processed.exists());
        let drawn = image::open(boxes).unwrap().to_rgb8();
        assert_eq!(drawn.dimensions(), (20, 10));
        assert_eq!(*drawn.get_pixel(2, 2), BOX_COLOUR);
    }
}
