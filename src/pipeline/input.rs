//! Input classification: decide whether a path is a PDF or a single image.
//!
//! Classification is by extension only (case-insensitive). The file must
//! exist; its contents are not sniffed here. A PDF with a bad header fails
//! later in [`super::render`] as `CorruptPdf`, and a bad image fails inside
//! its work item as `ItemError::ImageLoad`.

use crate::error::OcrError;
use std::path::Path;
use tracing::debug;

/// Image extensions accepted as single-page inputs (lowercase, no dot).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// What kind of source a path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Rasterised page by page.
    Pdf,
    /// Processed as one work item.
    Image,
}

/// True when the extension is `.pdf` in any case.
pub fn is_pdf(path: &Path) -> bool {
    extension_lowercase(path).as_deref() == Some("pdf")
}

/// True when the extension is one of [`IMAGE_EXTENSIONS`] in any case.
pub fn is_image(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Classify a path by extension, without checking that it exists.
pub fn classify(path: &Path) -> Result<InputKind, OcrError> {
    if is_pdf(path) {
        Ok(InputKind::Pdf)
    } else if is_image(path) {
        Ok(InputKind::Image)
    } else {
        Err(OcrError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

/// Check that `path` exists and is a file, then classify it.
pub fn validate(path: &Path) -> Result<InputKind, OcrError> {
    if !path.is_file() {
        return Err(OcrError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let kind = classify(path)?;
    debug!("Resolved {:?} input: {}", kind, path.display());
    Ok(kind)
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_any_case() {
        assert_eq!(classify(Path::new("a.pdf")).unwrap(), InputKind::Pdf);
        assert_eq!(classify(Path::new("a.PDF")).unwrap(), InputKind::Pdf);
        for name in ["a.png", "b.JPG", "c.jpeg", "d.Bmp", "e.TIFF", "f.tif"] {
            assert_eq!(classify(Path::new(name)).unwrap(), InputKind::Image, "{name}");
        }
    }

    #[test]
    fn test_unsupported_extensions() {
        for name in ["notes.txt", "sheet.xlsx", "no_extension", "archive.pdf.gz"] {
            assert!(
                matches!(classify(Path::new(name)), Err(OcrError::UnsupportedFormat { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_validate_missing_file() {
        let result = validate(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(OcrError::FileNotFound { .. })));
    }

    #[test]
    fn test_validate_existing_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.md");
        std::fs::write(&path, "hi").unwrap();
        assert!(matches!(validate(&path), Err(OcrError::UnsupportedFormat { .. })));
    }
}
