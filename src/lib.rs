//! # formfill
//!
//! Backend for a form-filling assistant: OCR an uploaded form or ID document,
//! extract five fields with an LLM, drop every value that does not appear in
//! the source text, and write the reviewed values onto a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (image / PDF)
//!  │
//!  ├─ 1. Store    random uuid name under uploads/ (documents in uploads/docs/)
//!  ├─ 2. OCR      page 1 → grayscale → threshold → tesseract or vision model
//!  ├─ 3. Extract  one model request: name, dob, address, phone, email
//!  ├─ 4. Verify   null every value that is not verbatim in the OCR text
//!  │      … user reviews and edits …
//!  └─ 5. Fill     values beside matching labels, or a summary page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formfill::{FormFillConfig, FormFiller};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from EDGEQUAKE_LLM_PROVIDER / GEMINI_API_KEY / …
//!     let filler = FormFiller::from_config(FormFillConfig::default())?;
//!     let extracted = filler.extract_file(Path::new("passport.jpg")).await?;
//!     let filled = filler.fill(&extracted.fields, None).await?;
//!     println!("{}", filled.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formfill` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod fields;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FormFillConfig, FormFillConfigBuilder, OcrEngineKind};
pub use error::{FormFillError, LlmError};
pub use fields::{ExtractedFields, FieldName, FormFields};
pub use pipeline::extract::FieldExtractor;
pub use pipeline::fill::fill_pdf;
pub use pipeline::llm::{LlmClient, ProviderClient};
pub use pipeline::ocr::{OcrEngine, OcrTextExtractor, TextExtractor};
pub use process::{FillOutput, FormFiller, ProcessOutput, Upload};
pub use server::{create_router, serve, AppState, ServerConfig};
