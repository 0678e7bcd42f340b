//! Error types for the formfill library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FormFillError`] — **Fatal** for the current request: the upload could
//!   not be read, OCR failed, the PDF could not be written. The HTTP layer maps
//!   these to a 500 with the error message as `detail`.
//!
//! * [`LlmError`] — a failed model request. It never escapes field
//!   extraction: the extractor folds it into
//!   [`crate::fields::ExtractedFields::error`] and returns all-null fields, so
//!   a flaky model never turns into a failed request.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the formfill library.
#[derive(Debug, Error)]
pub enum FormFillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The upload could not be decoded as an image.
    #[error("Unsupported or corrupt image '{path}': {detail}")]
    InvalidImage { path: PathBuf, detail: String },

    /// The file was expected to be a PDF but is not one.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR executable could not be started (not installed, wrong path).
    #[error("Failed to run OCR engine '{command}': {reason}\nInstall tesseract-ocr or set --tesseract-cmd.")]
    OcrUnavailable { command: String, reason: String },

    /// The OCR engine ran but reported a failure.
    #[error("OCR failed for '{path}': {detail}")]
    OcrFailed { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error while rendering the page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// pdfium returned an error while writing text or saving the document.
    #[error("Failed to write PDF '{path}': {detail}")]
    PdfWriteFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision OCR engine could not get a transcription from the model.
    #[error("Vision OCR failed: {0}")]
    VisionOcrFailed(#[source] LlmError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a file under the uploads directory.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed request to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// The provider returned an error (HTTP failure, auth, quota, …).
    #[error("{0}")]
    Provider(String),

    /// The request did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with an empty body.
    #[error("model returned an empty response")]
    EmptyResponse,
}
