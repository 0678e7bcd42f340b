//! PDFium access: library binding and first-page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Every public async function here moves the work onto
//! Tokio's blocking pool so request handlers never stall a worker thread.
//!
//! ## Binding
//!
//! A fresh binding is created inside each blocking task and dropped with it;
//! `Pdfium` is neither `Send` nor `Sync`. Creating and dropping a binding
//! initialises and tears down the C library, so sessions are serialised by a
//! process-wide lock. Lookup order: `PDFIUM_LIB_PATH`, then the platform
//! library name in the working directory, then the system library search
//! path.

use crate::error::FormFillError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ops::Deref;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// A bound PDFium library, exclusive for as long as it lives.
pub struct PdfiumSession {
    // Declared first so the binding is dropped before the lock is released.
    pdfium: Pdfium,
    _guard: MutexGuard<'static, ()>,
}

impl Deref for PdfiumSession {
    type Target = Pdfium;

    fn deref(&self) -> &Pdfium {
        &self.pdfium
    }
}

/// Bind the PDFium library. Call from blocking code and keep the session
/// local; it blocks other sessions until dropped.
pub fn pdfium() -> Result<PdfiumSession, FormFillError> {
    let guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let pdfium = Pdfium::new(bind_library()?);
    Ok(PdfiumSession {
        pdfium,
        _guard: guard,
    })
}

/// `true` when a PDFium library can be bound in this process.
pub fn pdfium_available() -> bool {
    pdfium().is_ok()
}

fn bind_library() -> Result<Box<dyn PdfiumLibraryBindings>, FormFillError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            info!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
            return Pdfium::bind_to_library(&path)
                .map_err(|e| FormFillError::PdfiumBindingFailed(format!("'{path}': {e:?}")));
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| FormFillError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Open a PDF, mapping pdfium load failures onto [`FormFillError::CorruptPdf`].
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, FormFillError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| FormFillError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// Rasterise the first page of a PDF at `dpi`.
///
/// Returns `Ok(None)` for a document without pages.
pub async fn render_first_page(
    pdf_path: &Path,
    dpi: u32,
) -> Result<Option<DynamicImage>, FormFillError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_first_page_blocking(&path, dpi))
        .await
        .map_err(|e| FormFillError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_first_page_blocking(
    pdf_path: &Path,
    dpi: u32,
) -> Result<Option<DynamicImage>, FormFillError> {
    let pdfium = pdfium()?;
    let document = load_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    if pages.len() == 0 {
        info!("PDF '{}' has no pages", pdf_path.display());
        return Ok(None);
    }

    let page = pages.get(0).map_err(|e| FormFillError::RasterisationFailed {
        page: 1,
        detail: format!("{:?}", e),
    })?;

    let scale = dpi as f32 / 72.0;
    let target_width = ((page.width().value * scale).round() as i32).max(1);
    let render_config = PdfRenderConfig::new().set_target_width(target_width);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| FormFillError::RasterisationFailed {
            page: 1,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page 1 of '{}' at {} DPI → {}x{} px",
        pdf_path.display(),
        dpi,
        image.width(),
        image.height()
    );

    Ok(Some(image))
}
