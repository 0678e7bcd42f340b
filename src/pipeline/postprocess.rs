//! Post-processing: deterministic cleanup of model replies and OCR text.
//!
//! Models asked for "ONLY a valid JSON object" still wrap it in
//! ` ```json ... ``` ` fences now and then, prefix a byte-order mark, or use
//! `\r\n`. Tesseract ends every page with a form feed. These rules fix such
//! quirks without touching content, so the JSON parser and the substring
//! check see clean input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw model reply before JSON parsing.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip an outer code fence, with or without a language tag
/// 4. Trim surrounding whitespace
pub fn clean_model_output(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_code_fences(&s);
    s.trim().to_string()
}

/// Clean text produced by an OCR engine.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Drop form feeds (page breaks emitted by tesseract)
/// 3. Strip invisible Unicode
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Trim surrounding whitespace
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = s.replace('\x0c', "\n");
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Code fences ──────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[\w-]*[ \t]*\n?(.*?)\s*```$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Whitespace ───────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Invisible Unicode ────────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n{\"name\": \"Jane\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"name\": \"Jane\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let input = "```\n{\"name\": null}\n```\n";
        assert_eq!(strip_code_fences(input), "{\"name\": null}");
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_no_fences_passthrough() {
        let input = "{\"name\": \"Jane\"}";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_clean_model_output_bom_and_crlf() {
        let input = "\u{FEFF}```json\r\n{\"dob\": null}\r\n```\r\n";
        assert_eq!(clean_model_output(input), "{\"dob\": null}");
    }

    #[test]
    fn test_clean_ocr_form_feed() {
        let input = "Name: Jane Doe  \r\nPhone: 555-0100\n\x0c";
        assert_eq!(clean_ocr_text(input), "Name: Jane Doe\nPhone: 555-0100");
    }

    #[test]
    fn test_collapse_blank_lines() {
        let input = "a\n\n\n\n\n\nb";
        assert_eq!(collapse_blank_lines(input), "a\n\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("Ja\u{200B}ne\u{00AD}"), "Jane");
    }
}
