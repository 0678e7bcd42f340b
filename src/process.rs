//! Pipeline entry points: upload → OCR → extraction, and fields → PDF.
//!
//! [`FormFiller`] owns the two external seams (a [`TextExtractor`] and an
//! [`LlmClient`]) plus the config, and exposes the two operations the HTTP
//! surface and the CLI need. Extraction and filling are separate calls
//! because a user reviews and edits the fields in between.

use crate::config::FormFillConfig;
use crate::error::FormFillError;
use crate::fields::{ExtractedFields, FormFields};
use crate::pipeline::extract::FieldExtractor;
use crate::pipeline::fill::fill_pdf;
use crate::pipeline::input::{has_pdf_extension, resolve_template, save_upload};
use crate::pipeline::llm::{LlmClient, ProviderClient};
use crate::pipeline::ocr::{OcrTextExtractor, TextExtractor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One uploaded file as received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name, used only for its extension.
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<impl Into<String>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.map(Into::into),
            data: data.into(),
        }
    }
}

/// Result of processing an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub fields: ExtractedFields,
    /// Stored name of the form file when it can serve as a fill template.
    pub template_pdf_filename: Option<String>,
}

/// Result of filling a PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillOutput {
    /// File name of the written PDF, relative to the uploads directory.
    pub filled_pdf_filename: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// The OCR → extraction → fill pipeline.
pub struct FormFiller {
    config: FormFillConfig,
    text_extractor: Arc<dyn TextExtractor>,
    field_extractor: FieldExtractor,
}

impl FormFiller {
    pub fn new(
        config: FormFillConfig,
        text_extractor: Arc<dyn TextExtractor>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            config,
            text_extractor,
            field_extractor: FieldExtractor::new(llm),
        }
    }

    /// Resolve the model provider and OCR engine from `config`.
    pub fn from_config(config: FormFillConfig) -> Result<Self, FormFillError> {
        let llm: Arc<dyn LlmClient> = Arc::new(ProviderClient::from_config(&config)?);
        let text_extractor = Arc::new(OcrTextExtractor::from_config(&config, Arc::clone(&llm)));
        info!(
            "Pipeline ready: OCR engine {}, uploads in {}",
            config.ocr_engine,
            config.uploads_dir.display()
        );
        Ok(Self::new(config, text_extractor, llm))
    }

    pub fn config(&self) -> &FormFillConfig {
        &self.config
    }

    /// OCR a stored file and extract verified fields from its text.
    pub async fn extract_file(&self, path: &Path) -> Result<ExtractedFields, FormFillError> {
        let raw_text = self.text_extractor.extract_text(path).await?;
        Ok(self.field_extractor.extract(&raw_text).await)
    }

    /// Extract verified fields from text that is already available.
    pub async fn extract_text(&self, raw_text: &str) -> ExtractedFields {
        self.field_extractor.extract(raw_text).await
    }

    /// Store the uploads, OCR the right one, and extract fields.
    ///
    /// Supporting documents take precedence as OCR source: the first one is
    /// read if present, otherwise the form itself. The form is offered back
    /// as a template only when it is a PDF.
    pub async fn process_upload(
        &self,
        form: Upload,
        documents: Vec<Upload>,
    ) -> Result<ProcessOutput, FormFillError> {
        let start = Instant::now();
        let uploads_dir = &self.config.uploads_dir;
        let docs_dir = self.config.docs_dir();

        let form_path = save_upload(uploads_dir, form.file_name.as_deref(), &form.data).await?;
        let mut doc_paths = Vec::with_capacity(documents.len());
        for doc in &documents {
            doc_paths.push(save_upload(&docs_dir, doc.file_name.as_deref(), &doc.data).await?);
        }
        debug!(
            "Stored form {} and {} supporting document(s)",
            form_path.display(),
            doc_paths.len()
        );

        let ocr_source = doc_paths.first().unwrap_or(&form_path);
        info!("OCR source: {}", ocr_source.display());
        let fields = self.extract_file(ocr_source).await?;

        let template_pdf_filename = has_pdf_extension(&form_path)
            .then(|| form_path.file_name().and_then(|n| n.to_str()).map(String::from))
            .flatten();

        info!(
            "Processed upload in {}ms ({} field(s) extracted)",
            start.elapsed().as_millis(),
            fields.fields.iter().filter(|(_, v)| v.is_some()).count()
        );

        Ok(ProcessOutput {
            fields,
            template_pdf_filename,
        })
    }

    /// Write `fields` onto the named template (looked up in the uploads
    /// directory) or onto a summary page.
    pub async fn fill(
        &self,
        fields: &FormFields,
        template_pdf_filename: Option<&str>,
    ) -> Result<FillOutput, FormFillError> {
        let uploads_dir = &self.config.uploads_dir;
        let template = resolve_template(uploads_dir, template_pdf_filename);
        if template_pdf_filename.is_some() && template.is_none() {
            info!(
                "Template {:?} not found in uploads; writing summary",
                template_pdf_filename
            );
        }

        let path = fill_pdf(fields, uploads_dir, template.as_deref()).await?;
        let filled_pdf_filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .ok_or_else(|| FormFillError::Internal(format!("bad output path {}", path.display())))?;

        Ok(FillOutput {
            filled_pdf_filename,
            path,
        })
    }
}
