//! Nested school documents → records.
//!
//! Document shape (as served by the schools API):
//!
//! ```json
//! {
//!   "schoolId": "A",
//!   "name": "Alpha Elementary",
//!   "level": "E",
//!   "location": {
//!     "address": "1 Main St", "city": "La Plata", "state": "MD", "zipCode": "20646",
//!     "coordinates": { "type": "Point", "coordinates": [-76.97, 38.52] }
//!   },
//!   "yearlyData": [
//!     { "academicYear": { "short": "13-14", "full": "2013-2014" },
//!       "demographics": { "white": { "$numberInt": "10" }, "black": 5, "other": 0, "hispanic": 0, "total": 15 } }
//!   ]
//! }
//! ```
//!
//! Coordinates are GeoJSON, i.e. `[longitude, latitude]`.

use serde_json::Value;

use super::numbers::{coerce_coordinate, text_value};
use super::{read_counts, read_total};
use crate::error::{IngestError, IngestResult};
use crate::models::{AcademicYear, Coordinates, DemographicRecord, SchoolInfo, SchoolLevel};
use crate::validation::{RecordWarning, WarningKind};

/// Accepts either one document or an array of documents.
pub fn documents_from_json(value: Value) -> IngestResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        Value::Null => Err(IngestError::UnexpectedShape("null".into())),
        Value::Bool(_) => Err(IngestError::UnexpectedShape("a boolean".into())),
        Value::Number(_) => Err(IngestError::UnexpectedShape("a number".into())),
        Value::String(_) => Err(IngestError::UnexpectedShape("a string".into())),
    }
}

fn school_info(doc: &Value) -> SchoolInfo {
    let location = doc.get("location").unwrap_or(&Value::Null);
    let point = location
        .pointer("/coordinates/coordinates")
        .and_then(Value::as_array);

    let coordinates = match point {
        Some(lon_lat) => Coordinates::new(
            coerce_coordinate(lon_lat.get(1)),
            coerce_coordinate(lon_lat.first()),
        ),
        None => Coordinates::unlocated(),
    };

    let text = |v: Option<&Value>| text_value(v).unwrap_or_default();
    SchoolInfo {
        name: text(doc.get("name")),
        address: text(location.get("address")),
        city: text(location.get("city")),
        state: text(location.get("state")),
        zip: text(location.get("zipCode")),
        level: SchoolLevel::parse(&text(doc.get("level"))),
        coordinates,
    }
}

/// Index of each document's first yearly entry in the flattened sequence.
///
/// Every entry counts, including those of documents that end up skipped.
pub(crate) fn first_entry_indices(documents: &[Value]) -> Vec<usize> {
    let mut next = 0usize;
    documents
        .iter()
        .map(|doc| {
            let first = next;
            next += yearly_entries(doc).map_or(0, Vec::len);
            first
        })
        .collect()
}

fn yearly_entries(doc: &Value) -> Option<&Vec<Value>> {
    doc.get("yearlyData").and_then(Value::as_array)
}

/// Flatten documents into one record per yearly entry.
///
/// Warning `record_index` counts yearly entries across all documents, in
/// order (see [`first_entry_indices`]); `document_index` names the document.
pub fn records_from_documents(documents: &[Value]) -> (Vec<DemographicRecord>, Vec<RecordWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (doc_index, (doc, first_entry)) in documents.iter().zip(first_entry_indices(documents)).enumerate() {
        let Some(school_id) = text_value(doc.get("schoolId")) else {
            warnings.push(
                RecordWarning::new(
                    first_entry,
                    WarningKind::SkippedRow,
                    format!("document {} has no schoolId", doc_index),
                )
                .in_document(doc_index),
            );
            continue;
        };

        let Some(entries) = yearly_entries(doc) else {
            continue;
        };
        let info = school_info(doc);

        for (offset, entry) in entries.iter().enumerate() {
            let current = first_entry + offset;

            let academic_year = entry.get("academicYear").unwrap_or(&Value::Null);
            let short = text_value(academic_year.get("short"));
            let full = text_value(academic_year.get("full"));
            let Some(year) = AcademicYear::from_labels(short.as_deref(), full.as_deref()) else {
                warnings.push(
                    RecordWarning::new(current, WarningKind::SkippedRow, "yearly entry has no academic year")
                        .for_school(&school_id)
                        .in_document(doc_index),
                );
                continue;
            };

            let demographics = entry.get("demographics").unwrap_or(&Value::Null);
            let coerced_from = warnings.len();
            let counts = read_counts(demographics, |c| c.key(), current, &school_id, &mut warnings);
            for warning in &mut warnings[coerced_from..] {
                warning.document_index = Some(doc_index);
            }

            let mut record = DemographicRecord::new(school_id.clone(), year, counts).with_info(info.clone());
            record.reported_total = read_total(demographics, "total");
            records.push(record);
        }
    }

    (records, warnings)
}
