//! Pipeline stages for form filling.
//!
//! Each submodule implements one step. The two halves of the pipeline run in
//! separate requests: extraction produces fields for the user to review, and
//! filling writes the reviewed fields onto a PDF.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ extract ──▶ (review) ──▶ fill
//! (store)   (pdfium)  (text)  (LLM + check)             (pdfium)
//! ```
//!
//! 1. [`input`]   — store uploads under random names, resolve templates
//! 2. [`render`]  — rasterise page 1 of a PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`ocr`]     — binarise the page and read its text (tesseract or a
//!    vision model, see [`encode`])
//! 4. [`extract`] — one model request for the five fields, then drop every
//!    value that is not verbatim in the OCR text
//! 5. [`fill`]    — write values next to matching labels, or onto a
//!    summary page
//!
//! [`llm`] wraps the model provider with retry and timeout; [`postprocess`]
//! holds the text cleanup shared by OCR output and model replies.

pub mod encode;
pub mod extract;
pub mod fill;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
