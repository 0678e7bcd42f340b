//! Prompts sent to the language model.
//!
//! All prompt text lives here so tests can inspect it without a live model
//! and so the extraction contract (five keys, substrings only, null
//! otherwise) is stated in exactly one place.

/// System instruction for field extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an information extraction engine for ID cards and forms.

Given the OCR text of a filled document, extract the following fields when present:
- full name
- date of birth
- address
- phone number
- email

VERY IMPORTANT CONSTRAINTS:
- You must only use substrings that appear exactly in OCR_TEXT.
- Do not hallucinate or guess any value that is not clearly present.
- If you are not 100% sure a value is explicitly present in OCR_TEXT, set it to null.

Return ONLY a valid JSON object with keys:
  name, dob, address, phone, email
Missing values must be null."#;

/// System instruction for the vision OCR engine.
pub const TRANSCRIPTION_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the image exactly as printed or handwritten.

Rules:
- Preserve the reading order and line breaks of the document.
- Do not correct spelling, reformat dates, or expand abbreviations.
- Do not add commentary, headings, Markdown, or code fences.
- If the image contains no text, return an empty response."#;

/// Build the user message carrying the OCR text.
pub fn extraction_user_prompt(raw_text: &str) -> String {
    format!("OCR_TEXT:\n\n{raw_text}")
}
