use chrono::NaiveDate;
use serde_json::Value;

/// Pure value transformers for raw form fields.
///
/// Form frameworks hand us loosely-typed values (strings, sometimes numbers
/// or booleans); the remote API wants strict types. Each transformer here is
/// deterministic and side-effect free. The `*_value` adapters expose them
/// with the uniform signature used by the field-accessor step pipeline.

/// Converts common affirmative inputs to a boolean.
///
/// Accepts boolean true, numeric 1 (including the string "1"), or a string
/// that normalizes (trim, lowercase, accents stripped from a/e/i/o/u) to
/// "si", "yes" or "accepted". Everything else is false; there is no error
/// path.
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => {
            let trimmed = s.trim();
            // Numeric strings take the numeric rule: true iff exactly 1.
            if let Ok(n) = trimmed.parse::<f64>() {
                return n == 1.0;
            }
            let cleaned: String = trimmed.chars().map(strip_accent).collect();
            matches!(cleaned.to_lowercase().as_str(), "si" | "yes" | "accepted")
        }
        _ => false,
    }
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'Á' => 'a',
        'é' | 'É' => 'e',
        'í' | 'Í' => 'i',
        'ó' | 'Ó' => 'o',
        'ú' | 'Ú' => 'u',
        _ => c,
    }
}

/// Reformats a strict `d-m-Y` date string to `Y-m-d`.
///
/// The parsed date is rendered back to `d-m-Y` and compared with the trimmed
/// input; any mismatch rejects the value. This guards against lenient
/// auto-correction ("31-02-2024" must not silently become a valid date) and
/// against unpadded inputs like "1-2-2024". Non-string or empty input
/// returns None without error.
pub fn format_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = match NaiveDate::parse_from_str(raw, "%d-%m-%Y") {
        Ok(date) => date,
        Err(_) => {
            tracing::warn!("Invalid or non-'d-m-Y' date received: '{}'", raw);
            return None;
        }
    };
    if parsed.format("%d-%m-%Y").to_string() != raw {
        tracing::warn!("Date '{}' does not round-trip d-m-Y, rejecting", raw);
        return None;
    }
    Some(parsed.format("%Y-%m-%d").to_string())
}

/// Converts a raw value to a JSON number.
///
/// Numbers pass through unchanged. Strings are stripped of everything except
/// digits, dot and minus (currency symbols, grouping commas, spaces), then
/// parsed: a float if a dot remains, an integer otherwise. Unparseable,
/// empty or whitespace-only input returns None.
pub fn to_numeric(value: &Value) -> Option<Value> {
    if value.is_number() {
        return Some(value.clone());
    }
    let raw = value.as_str()?;
    if raw.trim().is_empty() {
        return None;
    }
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let parsed = if cleaned.contains('.') {
        cleaned
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    } else {
        cleaned.parse::<i64>().ok().map(Value::from)
    };

    if parsed.is_none() {
        tracing::warn!(
            "Could not convert value to numeric after cleaning: '{}' -> '{}'",
            raw,
            cleaned
        );
    }
    parsed
}

/// Keeps ASCII digits only (national IDs, phone numbers).
///
/// Returns None when nothing remains, so a symbols-only identifier counts
/// as absent rather than as an empty string.
pub fn clean_digits(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

// Adapters with the uniform `fn(&Value) -> Option<Value>` shape expected by
// the field-accessor transform steps.

pub fn bool_value(value: &Value) -> Option<Value> {
    Some(Value::Bool(to_bool(value)))
}

pub fn date_value(value: &Value) -> Option<Value> {
    format_date(value).map(Value::String)
}

pub fn numeric_value(value: &Value) -> Option<Value> {
    to_numeric(value)
}

pub fn digits_value(value: &Value) -> Option<Value> {
    clean_digits(value).map(Value::String)
}
