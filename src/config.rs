//! Configuration for the OCR → extraction → fill pipeline.
//!
//! Every knob lives in [`FormFillConfig`], built via its
//! [`FormFillConfigBuilder`]. The HTTP server, the CLI and the tests all go
//! through the same struct, so a run can be reproduced from its logged config.

use crate::error::FormFillError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the form-filling pipeline.
///
/// Built via [`FormFillConfig::builder()`] or using
/// [`FormFillConfig::default()`].
///
/// # Example
/// ```rust
/// use formfill::{FormFillConfig, OcrEngineKind};
///
/// let config = FormFillConfig::builder()
///     .uploads_dir("/var/lib/formfill/uploads")
///     .ocr_engine(OcrEngineKind::Tesseract)
///     .ocr_language("eng+deu")
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct FormFillConfig {
    /// Directory holding uploaded originals, `docs/` and filled PDFs. Default: `uploads`.
    pub uploads_dir: PathBuf,

    /// Which OCR engine turns uploads into text. Default: [`OcrEngineKind::Tesseract`].
    pub ocr_engine: OcrEngineKind,

    /// Tesseract language code(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable name or path. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// DPI used when rasterising the first page of a PDF for OCR. Range: 72–600. Default: 200.
    pub ocr_dpi: u32,

    /// Grayscale cut-off for binarisation before OCR. Pixels below become black. Default: 160.
    pub binarize_threshold: u8,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-nano".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    pub max_tokens: usize,

    /// Retry attempts on a failed model request. Default: 0 (no retries).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-request model timeout in seconds. Default: None (unbounded).
    pub api_timeout_secs: Option<u64>,
}

impl Default for FormFillConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            ocr_engine: OcrEngineKind::default(),
            ocr_language: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            ocr_dpi: 200,
            binarize_threshold: 160,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: None,
        }
    }
}

impl fmt::Debug for FormFillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFillConfig")
            .field("uploads_dir", &self.uploads_dir)
            .field("ocr_engine", &self.ocr_engine)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("binarize_threshold", &self.binarize_threshold)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl FormFillConfig {
    /// Create a new builder for `FormFillConfig`.
    pub fn builder() -> FormFillConfigBuilder {
        FormFillConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory for supporting documents uploaded alongside the form.
    pub fn docs_dir(&self) -> PathBuf {
        self.uploads_dir.join("docs")
    }
}

/// Builder for [`FormFillConfig`].
#[derive(Debug)]
pub struct FormFillConfigBuilder {
    config: FormFillConfig,
}

impl FormFillConfigBuilder {
    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn ocr_engine(mut self, engine: OcrEngineKind) -> Self {
        self.config.ocr_engine = engine;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn binarize_threshold(mut self, t: u8) -> Self {
        self.config.binarize_threshold = t;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FormFillConfig, FormFillError> {
        let c = &self.config;
        if c.ocr_dpi < 72 || c.ocr_dpi > 600 {
            return Err(FormFillError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr_dpi
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(FormFillError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.tesseract_cmd.trim().is_empty() {
            return Err(FormFillError::InvalidConfig(
                "Tesseract command must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(FormFillError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(FormFillError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The engine used to turn an uploaded image or PDF page into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// Local `tesseract` executable. (default)
    #[default]
    Tesseract,
    /// Verbatim transcription by the configured vision-capable model.
    Vision,
}

impl fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrEngineKind::Tesseract => f.write_str("tesseract"),
            OcrEngineKind::Vision => f.write_str("vision"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = FormFillConfig::default();
        assert_eq!(c.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(c.ocr_engine, OcrEngineKind::Tesseract);
        assert_eq!(c.ocr_language, "eng");
        assert_eq!(c.ocr_dpi, 200);
        assert_eq!(c.binarize_threshold, 160);
        assert_eq!(c.max_retries, 0);
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn dpi_setter_clamps() {
        let c = FormFillConfig::builder().ocr_dpi(10_000).build().unwrap();
        assert_eq!(c.ocr_dpi, 600);
        let c = FormFillConfig::builder().ocr_dpi(1).build().unwrap();
        assert_eq!(c.ocr_dpi, 72);
    }

    #[test]
    fn empty_language_rejected() {
        let err = FormFillConfig::builder().ocr_language("  ").build().unwrap_err();
        assert!(matches!(err, FormFillError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(FormFillConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(FormFillConfig::builder().api_timeout_secs(5).build().is_ok());
    }

    #[test]
    fn docs_dir_is_under_uploads() {
        let c = FormFillConfig::builder().uploads_dir("/tmp/up").build().unwrap();
        assert_eq!(c.docs_dir(), PathBuf::from("/tmp/up/docs"));
    }

    #[test]
    fn engine_kind_serde_lowercase() {
        let json = serde_json::to_string(&OcrEngineKind::Vision).unwrap();
        assert_eq!(json, "\"vision\"");
        assert_eq!(OcrEngineKind::Tesseract.to_string(), "tesseract");
    }
}
