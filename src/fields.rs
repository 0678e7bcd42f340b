//! The extracted-field data model and the substring invariant.
//!
//! [`ExtractedFields`] is the only entity the pipeline produces. Its five
//! values must each be found, modulo case and whitespace, inside the OCR text
//! they were extracted from; [`ExtractedFields::enforce_substring_invariant`]
//! nulls any value that is not.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// The five fields the model is asked for, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Name,
    Dob,
    Address,
    Phone,
    Email,
}

impl FieldName {
    /// All fields in schema order.
    pub const ALL: [FieldName; 5] = [
        FieldName::Name,
        FieldName::Dob,
        FieldName::Address,
        FieldName::Phone,
        FieldName::Email,
    ];

    /// JSON key used in model output and HTTP payloads.
    pub fn key(self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::Dob => "dob",
            FieldName::Address => "address",
            FieldName::Phone => "phone",
            FieldName::Email => "email",
        }
    }

    /// Human label used on the summary page.
    pub fn label(self) -> &'static str {
        match self {
            FieldName::Name => "Name",
            FieldName::Dob => "Date of Birth",
            FieldName::Address => "Address",
            FieldName::Phone => "Phone",
            FieldName::Email => "Email",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The five optional field values, as edited by a user or produced by the model.
///
/// Deserialisation ignores unknown keys so a client can post back a whole
/// [`ExtractedFields`] object (including `raw_text`) to `/fill`. Values are
/// read leniently: numbers and booleans become their JSON text, arrays and
/// objects become null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields {
    #[serde(default, deserialize_with = "lenient_scalar")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_scalar")]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "lenient_scalar")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_scalar")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_scalar")]
    pub email: Option<String>,
}

/// Strings pass through; numbers and booleans use their JSON text; anything
/// else counts as missing.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_to_string(&Value::deserialize(deserializer)?))
}

impl FormFields {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::Name => self.name.as_deref(),
            FieldName::Dob => self.dob.as_deref(),
            FieldName::Address => self.address.as_deref(),
            FieldName::Phone => self.phone.as_deref(),
            FieldName::Email => self.email.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, field: FieldName) -> &mut Option<String> {
        match field {
            FieldName::Name => &mut self.name,
            FieldName::Dob => &mut self.dob,
            FieldName::Address => &mut self.address,
            FieldName::Phone => &mut self.phone,
            FieldName::Email => &mut self.email,
        }
    }

    pub fn set(&mut self, field: FieldName, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Iterate `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldName, Option<&str>)> + '_ {
        FieldName::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, v)| v.is_none())
    }
}

/// Result of field extraction: the five values plus provenance.
///
/// Serialises to the flat JSON shape the frontend expects:
///
/// ```json
/// {"name": "Jane Doe", "dob": null, "address": null, "phone": null,
///  "email": null, "raw_text": "...", "_error": "..."}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(flatten)]
    pub fields: FormFields,

    /// The OCR text the values were extracted from.
    pub raw_text: String,

    /// Set when the model request failed.
    #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the model answered with something that is not a JSON object.
    #[serde(
        rename = "_raw_model_output",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_model_output: Option<String>,
}

impl ExtractedFields {
    /// All-null fields for `raw_text`.
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    /// All-null fields recording a failed model request.
    pub fn failed(raw_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(raw_text)
        }
    }

    /// Null every value that does not appear in `raw_text` after
    /// normalisation. Returns the fields that were dropped.
    pub fn enforce_substring_invariant(&mut self) -> Vec<FieldName> {
        let haystack = normalize(&self.raw_text);
        let mut dropped = Vec::new();
        for field in FieldName::ALL {
            let slot = self.fields.slot_mut(field);
            let keep = match slot.as_deref() {
                None => continue,
                Some(value) => is_verbatim_in(value, &haystack),
            };
            if !keep {
                *slot = None;
                dropped.push(field);
            }
        }
        dropped
    }

    /// `true` when every non-null value satisfies the substring invariant.
    pub fn satisfies_substring_invariant(&self) -> bool {
        let haystack = normalize(&self.raw_text);
        self.fields
            .iter()
            .all(|(_, v)| v.is_none_or(|v| is_verbatim_in(v, &haystack)))
    }
}

/// Lowercase and collapse every whitespace run to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `value` is non-blank and, normalised, a contiguous substring of the
/// already-normalised `haystack`.
fn is_verbatim_in(value: &str, haystack: &str) -> bool {
    let needle = normalize(value);
    !needle.is_empty() && haystack.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(raw: &str, f: impl FnOnce(&mut FormFields)) -> ExtractedFields {
        let mut e = ExtractedFields::empty(raw);
        f(&mut e.fields);
        e
    }

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize("  John\n\tSMITH  "), "john smith");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n "), "");
    }

    #[test]
    fn hallucinated_value_is_nulled() {
        let mut e = with("John Smith lives in Texas", |f| {
            f.name = Some("John Smith".into());
            f.dob = Some("1990-01-01".into());
        });
        let dropped = e.enforce_substring_invariant();
        assert_eq!(dropped, vec![FieldName::Dob]);
        assert_eq!(e.fields.name.as_deref(), Some("John Smith"));
        assert_eq!(e.fields.dob, None);
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        let mut e = with("Full Name:   JANE\n  DOE\nDOB 01/02/1985", |f| {
            f.name = Some("jane doe".into());
            f.dob = Some(" 01/02/1985 ".into());
        });
        assert!(e.enforce_substring_invariant().is_empty());
        assert_eq!(e.fields.name.as_deref(), Some("jane doe"));
    }

    #[test]
    fn blank_value_is_nulled() {
        let mut e = with("anything", |f| f.phone = Some("   ".into()));
        assert_eq!(e.enforce_substring_invariant(), vec![FieldName::Phone]);
        assert!(e.fields.is_empty());
    }

    #[test]
    fn empty_source_nulls_everything() {
        let mut e = with("", |f| {
            f.name = Some("a".into());
            f.email = Some("a@b.c".into());
        });
        e.enforce_substring_invariant();
        assert!(e.fields.is_empty());
        assert!(e.satisfies_substring_invariant());
    }

    #[test]
    fn serialises_flat_with_markers() {
        let mut e = ExtractedFields::failed("text", "model request failed: boom");
        e.fields.name = None;
        let v = serde_json::to_value(&e).unwrap();
        assert!(v["name"].is_null());
        assert_eq!(v["raw_text"], "text");
        assert_eq!(v["_error"], "model request failed: boom");
        assert!(v.get("_raw_model_output").is_none());
    }

    #[test]
    fn form_fields_ignore_unknown_keys() {
        let f: FormFields = serde_json::from_str(
            r#"{"name":"Jane","raw_text":"Jane","_error":null,"extra":1}"#,
        )
        .unwrap();
        assert_eq!(f.name.as_deref(), Some("Jane"));
        assert_eq!(f.dob, None);
    }

    #[test]
    fn form_fields_coerce_scalars() {
        let f: FormFields = serde_json::from_str(
            r#"{"name":42,"dob":true,"address":["12 Oak St"],"phone":{"home":"1"},"email":null}"#,
        )
        .unwrap();
        assert_eq!(f.name.as_deref(), Some("42"));
        assert_eq!(f.dob.as_deref(), Some("true"));
        assert_eq!(f.address, None);
        assert_eq!(f.phone, None);
        assert_eq!(f.email, None);
    }

    #[test]
    fn field_keys_and_labels() {
        let keys: Vec<_> = FieldName::ALL.iter().map(|f| f.key()).collect();
        assert_eq!(keys, ["name", "dob", "address", "phone", "email"]);
        assert_eq!(FieldName::Dob.label(), "Date of Birth");
    }
}
