//! Text extraction: turn an uploaded image or PDF into plain text.
//!
//! Two layers:
//!
//! * [`OcrEngine`] reads text off a single preprocessed page image.
//!   [`TesseractEngine`] drives the `tesseract` executable;
//!   [`VisionEngine`] asks a vision-capable model for a verbatim
//!   transcription.
//! * [`TextExtractor`] is what the rest of the crate calls: path in, text
//!   out. [`OcrTextExtractor`] loads the file (rasterising page 1 of a PDF),
//!   binarises it and hands it to an engine.

use crate::config::{FormFillConfig, OcrEngineKind};
use crate::error::{FormFillError, LlmError};
use crate::pipeline::encode::{encode_for_vision, encode_png};
use crate::pipeline::input::{resolve_local, SourceKind};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::render;
use crate::prompts::TRANSCRIPTION_SYSTEM_PROMPT;
use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Path in, plain text out.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String, FormFillError>;
}

/// Reads the text on one preprocessed page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    async fn recognize(&self, page: &GrayImage) -> Result<String, FormFillError>;
}

// ── Preprocessing ────────────────────────────────────────────────────────────

/// Grayscale, then binarise: pixels below `threshold` become black, the rest white.
pub fn binarize(image: &DynamicImage, threshold: u8) -> GrayImage {
    let mut gray = image.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < threshold { 0 } else { 255 };
    }
    gray
}

// ── Tesseract ────────────────────────────────────────────────────────────────

/// OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn recognize(&self, page: &GrayImage) -> Result<String, FormFillError> {
        let png = encode_png(page).map_err(|e| FormFillError::Internal(format!("PNG encode: {e}")))?;

        let tmp = tempfile::Builder::new()
            .prefix("formfill-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| FormFillError::Internal(format!("tempfile: {e}")))?;
        tokio::fs::write(tmp.path(), &png)
            .await
            .map_err(|e| FormFillError::WriteFailed {
                path: tmp.path().to_path_buf(),
                source: e,
            })?;

        let output = Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| FormFillError::OcrUnavailable {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FormFillError::OcrFailed {
                path: tmp.path().to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Vision model ─────────────────────────────────────────────────────────────

/// OCR by verbatim transcription from a vision-capable model.
pub struct VisionEngine {
    client: Arc<dyn LlmClient>,
}

impl VisionEngine {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OcrEngine for VisionEngine {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn recognize(&self, page: &GrayImage) -> Result<String, FormFillError> {
        let image = encode_for_vision(page)
            .map_err(|e| FormFillError::Internal(format!("PNG encode: {e}")))?;
        match self.client.transcribe(TRANSCRIPTION_SYSTEM_PROMPT, image).await {
            Ok(text) => Ok(text),
            // A blank page: the model was told to answer with nothing.
            Err(LlmError::EmptyResponse) => {
                debug!("Vision model found no text on the page");
                Ok(String::new())
            }
            Err(e) => Err(FormFillError::VisionOcrFailed(e)),
        }
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

/// [`TextExtractor`] that loads, binarises and OCRs the first page of a file.
pub struct OcrTextExtractor {
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
    threshold: u8,
}

impl OcrTextExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &FormFillConfig) -> Self {
        Self {
            engine,
            dpi: config.ocr_dpi,
            threshold: config.binarize_threshold,
        }
    }

    /// Build the engine named by `config.ocr_engine`. `client` is only used
    /// by the vision engine.
    pub fn from_config(config: &FormFillConfig, client: Arc<dyn LlmClient>) -> Self {
        let engine: Arc<dyn OcrEngine> = match config.ocr_engine {
            OcrEngineKind::Tesseract => Arc::new(TesseractEngine::new(
                config.tesseract_cmd.clone(),
                config.ocr_language.clone(),
            )),
            OcrEngineKind::Vision => Arc::new(VisionEngine::new(client)),
        };
        Self::new(engine, config)
    }

    /// Load the page to OCR: the image itself, or page 1 of a PDF.
    async fn load_page(&self, path: &Path) -> Result<Option<GrayImage>, FormFillError> {
        let threshold = self.threshold;
        let image = match SourceKind::from_path(path) {
            SourceKind::Pdf => render::render_first_page(path, self.dpi).await?,
            SourceKind::Image => Some(open_image(path.to_path_buf()).await?),
        };

        match image {
            Some(image) => tokio::task::spawn_blocking(move || Some(binarize(&image, threshold)))
                .await
                .map_err(|e| FormFillError::Internal(format!("Preprocess task panicked: {e}"))),
            None => Ok(None),
        }
    }
}

async fn open_image(path: PathBuf) -> Result<DynamicImage, FormFillError> {
    tokio::task::spawn_blocking(move || {
        image::open(&path).map_err(|e| FormFillError::InvalidImage {
            path: path.clone(),
            detail: e.to_string(),
        })
    })
    .await
    .map_err(|e| FormFillError::Internal(format!("Image load task panicked: {e}")))?
}

#[async_trait]
impl TextExtractor for OcrTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, FormFillError> {
        let start = Instant::now();
        resolve_local(path)?;

        let Some(page) = self.load_page(path).await? else {
            return Ok(String::new());
        };
        debug!(
            "OCR input {}x{} px from {}",
            page.width(),
            page.height(),
            path.display()
        );

        let raw = self.engine.recognize(&page).await?;
        let text = clean_ocr_text(&raw);
        info!(
            "OCR ({}) read {} chars from {} in {}ms",
            self.engine.name(),
            text.len(),
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use std::sync::Mutex;

    struct RecordingEngine {
        seen: Mutex<Vec<(u32, u32)>>,
    }

    #[async_trait]
    impl OcrEngine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn recognize(&self, page: &GrayImage) -> Result<String, FormFillError> {
            self.seen.lock().unwrap().push(page.dimensions());
            assert!(page.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
            Ok("Name: Jane Doe \r\n\x0c".to_string())
        }
    }

    struct FixedReply(Result<String, LlmError>);

    #[async_trait]
    impl LlmClient for FixedReply {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.0.clone()
        }

        async fn transcribe(
            &self,
            _system: &str,
            _image: edgequake_llm::ImageData,
        ) -> Result<String, LlmError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn vision_blank_page_reads_as_empty() {
        let engine = VisionEngine::new(Arc::new(FixedReply(Err(LlmError::EmptyResponse))));
        let page = GrayImage::from_pixel(4, 4, Luma([255]));
        assert_eq!(engine.recognize(&page).await.unwrap(), "");
    }

    #[tokio::test]
    async fn vision_request_failure_is_fatal() {
        let engine = VisionEngine::new(Arc::new(FixedReply(Err(LlmError::Provider(
            "quota exceeded".into(),
        )))));
        let page = GrayImage::from_pixel(4, 4, Luma([255]));
        let err = engine.recognize(&page).await.unwrap_err();
        assert!(matches!(err, FormFillError::VisionOcrFailed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn vision_text_passes_through() {
        let engine = VisionEngine::new(Arc::new(FixedReply(Ok("Name: Jane Doe".into()))));
        let page = GrayImage::from_pixel(4, 4, Luma([0]));
        assert_eq!(engine.recognize(&page).await.unwrap(), "Name: Jane Doe");
    }

    #[test]
    fn binarize_uses_threshold() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(3, 1, |x, _| {
            Luma([[159u8, 160, 200][x as usize]])
        }));
        let out = binarize(&img, 160);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
    }

    #[tokio::test]
    async fn extractor_binarises_and_cleans() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("id.png");
        RgbImage::from_pixel(20, 10, Rgb([120, 130, 140]))
            .save(&path)
            .unwrap();

        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
        });
        let extractor = OcrTextExtractor::new(engine.clone(), &FormFillConfig::default());
        let text = extractor.extract_text(&path).await.unwrap();

        assert_eq!(text, "Name: Jane Doe");
        assert_eq!(engine.seen.lock().unwrap().as_slice(), &[(20, 10)]);
    }

    #[tokio::test]
    async fn extractor_rejects_garbage_image() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
        });
        let extractor = OcrTextExtractor::new(engine, &FormFillConfig::default());
        let err = extractor.extract_text(&path).await.unwrap_err();
        assert!(matches!(err, FormFillError::InvalidImage { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn tesseract_missing_binary_is_reported() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", "eng");
        let page = GrayImage::from_pixel(4, 4, Luma([255]));
        let err = engine.recognize(&page).await.unwrap_err();
        assert!(matches!(err, FormFillError::OcrUnavailable { .. }), "got {err:?}");
    }
}
