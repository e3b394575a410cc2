//! Normalization from source formats into [`DemographicRecord`]s.
//!
//! Two adapters feed the same canonical record:
//!
//! ```text
//! CSV rows (flat, string cells)         ─┐
//!                                         ├─▶  Vec<DemographicRecord>  +  Vec<RecordWarning>
//! School documents (nested, $numberInt) ─┘
//! ```
//!
//! Bad numbers never fail a load: they become 0 and leave a warning behind.

pub mod numbers;
mod rows;
mod documents;

use serde::Serialize;
use serde_json::Value;

use crate::models::{Category, DemographicRecord, Demographics};
use crate::validation::{RecordWarning, WarningKind};

pub use documents::{documents_from_json, records_from_documents};
pub(crate) use documents::first_entry_indices;
pub use rows::records_from_rows;

/// Source format of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

/// Guess the format from the first non-blank byte.
pub fn detect_format(bytes: &[u8]) -> SourceFormat {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') | Some(b'{') => SourceFormat::Json,
        _ => SourceFormat::Csv,
    }
}

/// Where the records came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub format: SourceFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub columns: Vec<String>,
    /// CSV rows or school documents read.
    pub row_count: usize,
}

/// Normalized records plus everything noticed on the way.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub records: Vec<DemographicRecord>,
    pub warnings: Vec<RecordWarning>,
    pub source: SourceInfo,
}

/// Reads the four category counts from `fields`, where `key_of` names each
/// category's field. Defaulted values are recorded against `index`.
pub(crate) fn read_counts(
    fields: &Value,
    key_of: impl Fn(Category) -> &'static str,
    index: usize,
    school_id: &str,
    warnings: &mut Vec<RecordWarning>,
) -> Demographics {
    let mut counts = Demographics::default();
    for category in Category::ALL {
        let key = key_of(category);
        match numbers::coerce_count(fields.get(key)) {
            Ok(n) => counts.set(category, n),
            Err(issue) => warnings.push(
                RecordWarning::new(
                    index,
                    WarningKind::CoercedValue,
                    format!("{}: {}, using 0", key, issue),
                )
                .for_school(school_id),
            ),
        }
    }
    counts
}

/// Supplied total, if any. Unreadable totals are dropped (the sum wins anyway).
pub(crate) fn read_total(fields: &Value, key: &str) -> Option<u64> {
    numbers::coerce_count(fields.get(key)).ok()
}
