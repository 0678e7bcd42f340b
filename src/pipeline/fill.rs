//! Template filling: write field values onto a PDF.
//!
//! With a usable template, page 1 is searched for a fixed set of labels and
//! each matching value is written just right of its label. Without one (or
//! when no label matched), the values are listed on a summary page.
//!
//! Coordinates are PDF user space: points, origin bottom-left.

use crate::error::FormFillError;
use crate::fields::{FieldName, FormFields};
use crate::pipeline::input::is_usable_template;
use crate::pipeline::render::{load_document, pdfium};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Labels searched for on the template, in placement order.
///
/// `Name:` comes after `Full Name:` so the longer label wins when both match
/// the same text.
pub const TEMPLATE_LABELS: [(&str, FieldName); 6] = [
    ("Full Name:", FieldName::Name),
    ("Current Address:", FieldName::Address),
    ("Telephone Number:", FieldName::Phone),
    ("Email Address:", FieldName::Email),
    ("Name:", FieldName::Name),
    ("Date of Birth:", FieldName::Dob),
];

/// File name used when no template is given.
pub const SUMMARY_FILE_NAME: &str = "filled_form.pdf";

/// Heading of the summary page.
pub const SUMMARY_TITLE: &str = "Form Filler - Extracted Data";

const VALUE_FONT_SIZE: f32 = 10.0;
const VALUE_GAP: f32 = 8.0;
const BASELINE_RATIO: f32 = 0.7;

const SUMMARY_FONT_SIZE: f32 = 12.0;
const SUMMARY_MARGIN: f32 = 72.0;
const SUMMARY_LINE_HEIGHT: f32 = SUMMARY_FONT_SIZE * 1.4;

/// Output path for a filled template: `<stem>_filled.pdf`.
pub fn filled_file_name(template: &Path) -> String {
    let stem = template
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");
    format!("{stem}_filled.pdf")
}

/// Text lines of the summary page.
pub fn summary_lines(fields: &FormFields) -> Vec<String> {
    let mut lines = vec![SUMMARY_TITLE.to_string(), String::new()];
    lines.extend(
        fields
            .iter()
            .map(|(field, value)| format!("{}: {}", field.label(), value.unwrap_or(""))),
    );
    lines
}

/// Write `fields` onto `template` (or a summary document) under `output_dir`.
///
/// Returns the path of the written PDF.
pub async fn fill_pdf(
    fields: &FormFields,
    output_dir: &Path,
    template: Option<&Path>,
) -> Result<PathBuf, FormFillError> {
    let fields = fields.clone();
    let output_dir = output_dir.to_path_buf();
    let template = template.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || fill_blocking(&fields, &output_dir, template.as_deref()))
        .await
        .map_err(|e| FormFillError::Internal(format!("Fill task panicked: {}", e)))?
}

fn fill_blocking(
    fields: &FormFields,
    output_dir: &Path,
    template: Option<&Path>,
) -> Result<PathBuf, FormFillError> {
    std::fs::create_dir_all(output_dir).map_err(|e| FormFillError::WriteFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let pdfium = pdfium()?;
    match template.filter(|t| is_usable_template(t)) {
        Some(template) => fill_template(&pdfium, fields, output_dir, template),
        None => {
            if let Some(t) = template {
                info!("Template '{}' is not a usable PDF; writing summary", t.display());
            }
            write_summary_document(&pdfium, fields, output_dir)
        }
    }
}

fn fill_template(
    pdfium: &Pdfium,
    fields: &FormFields,
    output_dir: &Path,
    template: &Path,
) -> Result<PathBuf, FormFillError> {
    let out = output_dir.join(filled_file_name(template));
    let write_err = |e: PdfiumError| FormFillError::PdfWriteFailed {
        path: out.clone(),
        detail: format!("{:?}", e),
    };

    let mut document = load_document(pdfium, template)?;
    let font = document.fonts_mut().helvetica();

    let placed = if document.pages().len() == 0 {
        0
    } else {
        let mut page = document.pages().get(0).map_err(write_err)?;
        let placements = plan_placements(&page, fields).map_err(write_err)?;
        for placement in &placements {
            debug!(
                "Placing {} at ({:.1}, {:.1})",
                placement.field, placement.x, placement.y
            );
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(placement.x),
                    PdfPoints::new(placement.y),
                    &placement.value,
                    font,
                    PdfPoints::new(VALUE_FONT_SIZE),
                )
                .map_err(write_err)?;
        }
        placements.len()
    };

    if placed == 0 {
        info!(
            "No template labels matched in '{}'; appending summary page",
            template.display()
        );
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(write_err)?;
        draw_summary(&mut page, fields, font).map_err(write_err)?;
    }

    document.save_to_file(&out).map_err(write_err)?;
    info!(
        "Filled template '{}' with {} value(s) → {}",
        template.display(),
        placed,
        out.display()
    );
    Ok(out)
}

fn write_summary_document(
    pdfium: &Pdfium,
    fields: &FormFields,
    output_dir: &Path,
) -> Result<PathBuf, FormFillError> {
    let out = output_dir.join(SUMMARY_FILE_NAME);
    let write_err = |e: PdfiumError| FormFillError::PdfWriteFailed {
        path: out.clone(),
        detail: format!("{:?}", e),
    };

    let mut document = pdfium.create_new_pdf().map_err(write_err)?;
    let font = document.fonts_mut().helvetica();
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(write_err)?;
        draw_summary(&mut page, fields, font).map_err(write_err)?;
    }

    document.save_to_file(&out).map_err(write_err)?;
    info!("Wrote summary PDF → {}", out.display());
    Ok(out)
}

fn draw_summary(
    page: &mut PdfPage,
    fields: &FormFields,
    font: PdfFontToken,
) -> Result<(), PdfiumError> {
    let top = page.height().value - SUMMARY_MARGIN;
    for (i, line) in summary_lines(fields).iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let y = top - i as f32 * SUMMARY_LINE_HEIGHT;
        page.objects_mut().create_text_object(
            PdfPoints::new(SUMMARY_MARGIN),
            PdfPoints::new(y),
            line,
            font,
            PdfPoints::new(SUMMARY_FONT_SIZE),
        )?;
    }
    Ok(())
}

// ── Label search ─────────────────────────────────────────────────────────────

/// Axis-aligned box in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LabelBox {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

impl LabelBox {
    fn from_rect(r: &PdfRect) -> Self {
        Self {
            left: r.left().value,
            bottom: r.bottom().value,
            right: r.right().value,
            top: r.top().value,
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }

    /// Where a value belonging to this label starts: right of the box,
    /// baseline 70 % of the way down.
    fn value_origin(&self) -> (f32, f32) {
        let x = self.right + VALUE_GAP;
        let y = self.top - (self.top - self.bottom) * BASELINE_RATIO;
        (x, y)
    }
}

#[derive(Debug)]
struct Placement {
    field: FieldName,
    value: String,
    x: f32,
    y: f32,
}

/// Candidate label boxes for one value, in search order.
#[derive(Debug)]
struct LabelHits {
    field: FieldName,
    value: String,
    hits: Vec<LabelBox>,
}

/// Search the page for every label whose field has a non-empty value.
fn plan_placements(page: &PdfPage, fields: &FormFields) -> Result<Vec<Placement>, PdfiumError> {
    let mut found = Vec::new();
    for (label, field) in TEMPLATE_LABELS {
        let Some(value) = fields.get(field).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        found.push(LabelHits {
            field,
            value: value.to_string(),
            hits: find_label(page, label)?,
        });
    }
    Ok(place_values(found))
}

/// Decide where each value goes. A label hit that overlaps one already used
/// is skipped in favour of the next hit.
fn place_values(found: Vec<LabelHits>) -> Vec<Placement> {
    let mut used: Vec<LabelBox> = Vec::new();
    let mut placements = Vec::new();

    for LabelHits { field, value, hits } in found {
        let Some(hit) = hits.into_iter().find(|b| !used.iter().any(|u| u.overlaps(b))) else {
            continue;
        };
        let (x, y) = hit.value_origin();
        used.push(hit);
        placements.push(Placement { field, value, x, y });
    }

    placements
}

/// Every occurrence of `label` on the page, in search order.
fn find_label(page: &PdfPage, label: &str) -> Result<Vec<LabelBox>, PdfiumError> {
    let text = page.text()?;
    let search = text.search(label, &PdfSearchOptions::new())?;

    let mut hits = Vec::new();
    while let Some(segments) = search.find_next() {
        let bounds = segments
            .iter()
            .map(|segment| LabelBox::from_rect(&segment.bounds()))
            .reduce(LabelBox::union);
        if let Some(b) = bounds {
            hits.push(b);
        }
    }
    Ok(hits)
}
