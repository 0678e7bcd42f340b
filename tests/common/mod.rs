//! In-memory stand-ins for the model and OCR seams.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_llm::ImageData;
use formfill::{FormFillConfig, FormFillError, FormFiller, LlmClient, LlmError, TextExtractor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replies with a fixed string (or error) and counts calls.
pub struct ScriptedLlm {
    reply: Result<String, LlmError>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        self.reply.clone()
    }

    async fn transcribe(&self, _system: &str, _image: ImageData) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// Returns the same text for every file and records which paths were read.
pub struct FixedText {
    text: String,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl FixedText {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextExtractor for FixedText {
    async fn extract_text(&self, path: &Path) -> Result<String, FormFillError> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        Ok(self.text.clone())
    }
}

/// A pipeline writing under `uploads_dir` with mocked OCR and model.
pub fn mock_filler(
    uploads_dir: &Path,
    ocr: Arc<FixedText>,
    llm: Arc<ScriptedLlm>,
) -> FormFiller {
    let config = FormFillConfig::builder()
        .uploads_dir(uploads_dir)
        .build()
        .unwrap();
    FormFiller::new(config, ocr, llm)
}

/// `true` when the PDFium library can be bound; prints a skip notice otherwise.
pub fn pdfium_or_skip() -> bool {
    if formfill::pipeline::render::pdfium_available() {
        true
    } else {
        println!("SKIP — PDFium library not available (set PDFIUM_LIB_PATH)");
        false
    }
}
