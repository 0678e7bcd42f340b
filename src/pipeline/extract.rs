//! Field extraction and verification.
//!
//! One model request per document. The reply is parsed as a JSON object
//! (after fence stripping) and every value is then checked against the
//! source text; see [`crate::fields::ExtractedFields::enforce_substring_invariant`].
//! This function never fails: request errors and unparseable replies both
//! degrade to all-null fields with a marker explaining why.

use crate::fields::{scalar_to_string, ExtractedFields, FieldName, FormFields};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::postprocess::clean_model_output;
use crate::prompts::{extraction_user_prompt, EXTRACTION_SYSTEM_PROMPT};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extracts the five form fields from OCR text through an [`LlmClient`].
#[derive(Clone)]
pub struct FieldExtractor {
    client: Arc<dyn LlmClient>,
}

impl FieldExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Extract and verify fields from `raw_text`.
    pub async fn extract(&self, raw_text: &str) -> ExtractedFields {
        if raw_text.trim().is_empty() {
            debug!("Empty source text; skipping model request");
            return ExtractedFields::empty(raw_text);
        }

        let start = Instant::now();
        let reply = match self
            .client
            .complete(EXTRACTION_SYSTEM_PROMPT, &extraction_user_prompt(raw_text))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Field extraction request failed: {}", e);
                return ExtractedFields::failed(raw_text, format!("model request failed: {e}"));
            }
        };
        debug!("Model replied with {} bytes in {:?}", reply.len(), start.elapsed());

        let mut result = parse_model_reply(&reply, raw_text);
        let dropped = result.enforce_substring_invariant();
        if !dropped.is_empty() {
            info!(
                "Dropped {} unverifiable field(s): {}",
                dropped.len(),
                dropped
                    .iter()
                    .map(|f| f.key())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        result
    }
}

/// Parse a model reply into (unverified) fields.
///
/// Anything that is not a JSON object after cleanup yields all-null fields
/// with the cleaned reply kept in `_raw_model_output`.
pub fn parse_model_reply(reply: &str, raw_text: &str) -> ExtractedFields {
    let cleaned = clean_model_output(reply);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => ExtractedFields {
            fields: fields_from_object(&map),
            ..ExtractedFields::empty(raw_text)
        },
        Ok(other) => {
            warn!("Model reply is JSON but not an object ({})", json_kind(&other));
            ExtractedFields {
                raw_model_output: Some(cleaned),
                ..ExtractedFields::empty(raw_text)
            }
        }
        Err(e) => {
            warn!("Model reply is not valid JSON: {}", e);
            ExtractedFields {
                raw_model_output: Some(cleaned),
                ..ExtractedFields::empty(raw_text)
            }
        }
    }
}

fn fields_from_object(map: &Map<String, Value>) -> FormFields {
    let mut fields = FormFields::default();
    for field in FieldName::ALL {
        fields.set(field, map.get(field.key()).and_then(scalar_to_string));
    }
    fields
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fenced_object() {
        let reply = "```json\n{\"name\": \"Jane Doe\", \"dob\": null, \"phone\": 5550100}\n```";
        let e = parse_model_reply(reply, "src");
        assert_eq!(e.fields.name.as_deref(), Some("Jane Doe"));
        assert_eq!(e.fields.dob, None);
        assert_eq!(e.fields.phone.as_deref(), Some("5550100"));
        assert_eq!(e.raw_text, "src");
        assert!(e.raw_model_output.is_none());
    }

    #[test]
    fn parse_malformed_keeps_raw() {
        let e = parse_model_reply("Sure! The name is Jane.", "src");
        assert!(e.fields.is_empty());
        assert_eq!(e.raw_model_output.as_deref(), Some("Sure! The name is Jane."));
    }

    #[test]
    fn parse_non_object_keeps_raw() {
        let e = parse_model_reply("[\"Jane\"]", "src");
        assert!(e.fields.is_empty());
        assert_eq!(e.raw_model_output.as_deref(), Some("[\"Jane\"]"));
    }

    #[test]
    fn nested_values_are_missing() {
        let e = parse_model_reply(r#"{"address": {"city": "Austin"}, "email": ["a@b.c"]}"#, "");
        assert!(e.fields.is_empty());
    }
}
