//! Lenient number extraction.
//!
//! Sources hand us counts as JSON numbers, numeric strings (CSV cells) or
//! typed envelopes such as `{"$numberInt": "123"}`. Anything unusable becomes
//! 0 (counts) or `NaN` (coordinates) and the caller records a warning.

use serde_json::Value;

/// Envelope keys used by extended-JSON exports.
const NUMBER_ENVELOPES: [&str; 4] = ["$numberInt", "$numberLong", "$numberDouble", "$numberDecimal"];

/// Largest count accepted for one category of one record.
///
/// Keeps yearly sums far from `u64::MAX`, so stacked totals never saturate.
pub const MAX_COUNT: u64 = 1_000_000_000_000;

/// Why a count could not be read as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountIssue {
    /// Field absent, null or blank.
    Missing,
    /// Present but not a number.
    NotNumeric(String),
    /// A number, but negative, non-finite or above [`MAX_COUNT`].
    OutOfRange(String),
}

impl std::fmt::Display for CountIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing value"),
            Self::NotNumeric(raw) => write!(f, "'{}' is not a number", raw),
            Self::OutOfRange(raw) => write!(f, "'{}' is out of range for a count", raw),
        }
    }
}

/// Strips `{"$numberInt": ...}`-style wrappers.
pub fn unwrap_envelope(value: &Value) -> &Value {
    if let Value::Object(map) = value {
        for key in NUMBER_ENVELOPES {
            if let Some(inner) = map.get(key) {
                return inner;
            }
        }
    }
    value
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Reads a number from a plain number, numeric string or envelope.
pub fn extract_number(value: &Value) -> Option<f64> {
    match unwrap_envelope(value) {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads a non-negative integer count up to [`MAX_COUNT`]. Fractions are truncated.
pub fn coerce_count(value: Option<&Value>) -> Result<u64, CountIssue> {
    let value = match value.map(unwrap_envelope) {
        None => return Err(CountIssue::Missing),
        Some(v) if is_blank(v) => return Err(CountIssue::Missing),
        Some(v) => v,
    };

    let exact = match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        other => other.as_u64(),
    };

    let raw = raw_text(value);
    let count = match exact {
        Some(n) => n,
        None => match extract_number(value) {
            Some(n) if n.is_finite() && n >= 0.0 && n <= MAX_COUNT as f64 => n.trunc() as u64,
            Some(_) => return Err(CountIssue::OutOfRange(raw)),
            None => return Err(CountIssue::NotNumeric(raw)),
        },
    };

    if count > MAX_COUNT {
        return Err(CountIssue::OutOfRange(raw));
    }
    Ok(count)
}

/// Reads a coordinate; `NaN` when absent or malformed.
pub fn coerce_coordinate(value: Option<&Value>) -> f64 {
    value
        .and_then(extract_number)
        .filter(|n| n.is_finite())
        .unwrap_or(f64::NAN)
}

/// Text form of a scalar; identifiers sometimes arrive as numbers or envelopes.
pub fn text_value(value: Option<&Value>) -> Option<String> {
    let text = match unwrap_envelope(value?) {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
