use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Typed field access over a raw form submission.
///
/// Raw submissions arrive as a loose key/value map. `FieldReader` looks a
/// field up and runs it through an ordered pipeline of typed steps, with
/// explicit early-exit semantics: any step that rejects its input makes the
/// whole lookup yield None, so callers fall back to their default instead of
/// receiving a half-transformed value.

/// One step of a field pipeline.
#[derive(Clone, Copy)]
pub enum FieldStep {
    /// Pure value transform (bool/date/numeric/digits). Returning None
    /// means the transformer rejected the raw input.
    Transform(fn(&Value) -> Option<Value>),
    /// String sanitizer. Applied only while the value is still a string;
    /// returning None means the string was unusable (e.g. invalid email).
    Sanitize(fn(&str) -> Option<String>),
}

/// Default pipeline for plain text fields.
pub const TEXT: &[FieldStep] = &[FieldStep::Sanitize(sanitize_text)];

/// Read-only accessor over one submission's raw data.
pub struct FieldReader<'a> {
    data: &'a Map<String, Value>,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a Map<String, Value>) -> Self {
        Self { data }
    }

    /// Looks up `key` as sanitized text.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_with(key, TEXT)
    }

    /// Looks up `key` and runs the raw value through `steps` in order.
    ///
    /// Yields None when the field is absent, is null, trims to an empty
    /// string, or when any step rejects the value.
    pub fn get_with(&self, key: &str, steps: &[FieldStep]) -> Option<Value> {
        let raw = self.data.get(key)?;
        if raw.is_null() {
            return None;
        }
        if let Some(s) = raw.as_str() {
            if s.trim().is_empty() {
                return None;
            }
        }

        let mut value = raw.clone();
        for step in steps {
            match step {
                FieldStep::Transform(transform) => {
                    value = transform(&value)?;
                }
                FieldStep::Sanitize(sanitize) => {
                    if let Some(s) = value.as_str() {
                        value = Value::String(sanitize(s)?);
                    }
                }
            }
        }
        Some(value)
    }
}

/// Strips markup and normalizes whitespace in free-text fields.
///
/// Tags are removed rather than escaped; runs of whitespace collapse to a
/// single space. A value that is empty after cleaning counts as absent.
pub fn sanitize_text(raw: &str) -> Option<String> {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    let ws_re = WS_RE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let stripped = tag_re.replace_all(raw, "");
    let collapsed = ws_re.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Validates and normalizes an email address.
///
/// Lowercases and shape-checks the address; anything that does not look like
/// `local@domain.tld` is rejected so a garbage email falls back to the
/// field's default instead of reaching the remote API.
pub fn sanitize_email(raw: &str) -> Option<String> {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let email_re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+$").unwrap()
    });

    let email = raw.trim().to_lowercase();
    if email_re.is_match(&email) {
        Some(email)
    } else {
        tracing::warn!("Discarding invalid email value");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform;
    use serde_json::json;

    fn submission(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn absent_and_blank_fields_yield_none() {
        let data = submission(&[("blank", json!("   ")), ("null", json!(null))]);
        let reader = FieldReader::new(&data);

        assert_eq!(reader.get("missing"), None);
        assert_eq!(reader.get("blank"), None);
        assert_eq!(reader.get("null"), None);
    }

    #[test]
    fn text_fields_are_sanitized() {
        let data = submission(&[("name", json!("  Ana   <b>María</b> "))]);
        let reader = FieldReader::new(&data);

        assert_eq!(reader.get("name"), Some(json!("Ana María")));
    }

    #[test]
    fn markup_only_input_counts_as_absent() {
        let data = submission(&[("name", json!("<p></p>"))]);
        let reader = FieldReader::new(&data);

        assert_eq!(reader.get("name"), None);
    }

    #[test]
    fn transformer_rejection_exits_early() {
        let data = submission(&[("birthday", json!("not-a-date"))]);
        let reader = FieldReader::new(&data);

        let steps = [FieldStep::Transform(transform::date_value)];
        assert_eq!(reader.get_with("birthday", &steps), None);
    }

    #[test]
    fn transform_then_sanitize_runs_in_order() {
        let data = submission(&[("birthday", json!("05-03-1990"))]);
        let reader = FieldReader::new(&data);

        let steps = [
            FieldStep::Transform(transform::date_value),
            FieldStep::Sanitize(sanitize_text),
        ];
        assert_eq!(reader.get_with("birthday", &steps), Some(json!("1990-03-05")));
    }

    #[test]
    fn sanitizers_skip_non_string_values() {
        let data = submission(&[("accepted", json!("Sí"))]);
        let reader = FieldReader::new(&data);

        let steps = [
            FieldStep::Transform(transform::bool_value),
            FieldStep::Sanitize(sanitize_text),
        ];
        assert_eq!(reader.get_with("accepted", &steps), Some(json!(true)));
    }

    #[test]
    fn email_sanitizer_validates_shape() {
        assert_eq!(
            sanitize_email(" Ana.Lopez@Example.COM "),
            Some("ana.lopez@example.com".into())
        );
        assert_eq!(sanitize_email("not-an-email"), None);
        assert_eq!(sanitize_email("user@domain"), None);
        assert_eq!(sanitize_email("@example.com"), None);
    }
}
