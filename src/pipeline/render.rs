//! PDF rasterisation: render every page to an RGB bitmap via pdfium.
//!
//! pdfium keeps thread-local state and blocks for the whole render, so the
//! work runs inside `tokio::task::spawn_blocking`. Pages are returned in
//! document order; the dispatcher derives `page_NNN` prefixes from that
//! order before any OCR starts.
//!
//! The render scale is `dpi / 72` (PDF user space is 72 units per inch),
//! with both edges capped at `max_pixels` so an oversized page cannot
//! exhaust memory.

use crate::error::OcrError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library.
///
/// Tried in order: `PDFIUM_LIB_PATH`, the platform library name in the
/// working directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, OcrError> {
    let mut tried = Vec::new();

    if let Ok(env_path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(env_path);
        match Pdfium::bind_to_library(&path) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", path.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => tried.push(format!("{}: {}", path.display(), e)),
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&local) {
        Ok(bindings) => {
            debug!("Bound pdfium from {}", local.display());
            return Ok(Pdfium::new(bindings));
        }
        Err(e) => tried.push(format!("{}: {}", local.display(), e)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            tried.push(format!("system library: {}", e));
            Err(OcrError::PdfiumBindingFailed(tried.join("; ")))
        }
    }
}

/// Rasterise every page of a PDF at `dpi`, capped at `max_pixels` per edge.
pub async fn rasterize(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, OcrError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        rasterize_blocking(&path, dpi, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Render task panicked: {}", e)))?
}

fn rasterize_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, OcrError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password.is_some(), &e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(OcrError::NoPages {
            path: pdf_path.to_path_buf(),
        });
    }

    let render_config = render_config(dpi, max_pixels);
    let mut images = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            OcrError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

fn render_config(dpi: u32, max_pixels: u32) -> PdfRenderConfig {
    let cap = max_pixels.min(i32::MAX as u32) as i32;
    PdfRenderConfig::new()
        .scale_page_by_factor(scale_factor(dpi))
        .set_maximum_width(cap)
        .set_maximum_height(cap)
}

/// Points-to-pixels scale for a DPI.
fn scale_factor(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

fn load_error(pdf_path: &Path, had_password: bool, e: &PdfiumError) -> OcrError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            OcrError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            OcrError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        OcrError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor() {
        assert_eq!(scale_factor(72), 1.0);
        assert_eq!(scale_factor(144), 2.0);
        assert!((scale_factor(300) - 4.1666665).abs() < 1e-4);
    }

    #[test]
    fn test_password_error_mapping() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            load_error(Path::new("a.pdf"), false, &e),
            OcrError::PasswordRequired { .. }
        ));
        assert!(matches!(
            load_error(Path::new("a.pdf"), true, &e),
            OcrError::WrongPassword { .. }
        ));
    }

    #[test]
    fn test_format_error_is_corrupt() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        assert!(matches!(
            load_error(Path::new("a.pdf"), false, &e),
            OcrError::CorruptPdf { .. }
        ));
    }
}
