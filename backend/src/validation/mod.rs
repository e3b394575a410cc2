//! Validation for school documents and normalized records.
//!
//! Nothing here aborts a load. Problems surface as [`RecordWarning`]s that
//! travel with the dashboard so a client can show them next to the charts.
//!
//! # Document schema
//!
//! Nested school documents are checked against JSON Schema Draft 7, embedded
//! at compile time from `schemas/school-document.json`.
//!
//! # Record checks
//!
//! - supplied `total` disagrees with the category sum
//! - school has no usable coordinates
//! - year label does not have the `NN-NN` shape

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::models::DemographicRecord;

// =============================================================================
// Warnings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// A numeric field was replaced by 0.
    CoercedValue,
    /// A row could not become a record (no school id or year).
    SkippedRow,
    /// A document failed the embedded schema.
    SchemaViolation,
    /// Supplied total differs from the category sum.
    TotalMismatch,
    /// Latitude/longitude missing or malformed.
    Unlocated,
    /// Year label will not sort chronologically.
    UnusualYear,
}

/// A non-fatal problem tied to one input row or record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWarning {
    /// Index in the input sequence: the CSV data row, or for JSON the yearly
    /// entry counted across all documents in order. Document-level warnings
    /// point at the document's first entry.
    pub record_index: usize,
    /// School document the warning came from (JSON input only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_index: Option<usize>,
    pub school_id: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

impl RecordWarning {
    pub fn new(record_index: usize, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            record_index,
            document_index: None,
            school_id: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_school(mut self, school_id: impl Into<String>) -> Self {
        self.school_id = Some(school_id.into());
        self
    }

    pub fn in_document(mut self, document_index: usize) -> Self {
        self.document_index = Some(document_index);
        self
    }
}

impl std::fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.record_index)?;
        match (self.document_index, &self.school_id) {
            (Some(doc), Some(id)) => write!(f, " (document {}, school {})", doc, id)?,
            (Some(doc), None) => write!(f, " (document {})", doc)?,
            (None, Some(id)) => write!(f, " (school {})", id)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

// =============================================================================
// JSON Schema
// =============================================================================

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check, true/false only.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

static DOCUMENT_VALIDATOR: Lazy<Result<jsonschema::Validator, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(include_str!("../../schemas/school-document.json"))
        .map_err(|e| format!("Invalid embedded schema: {}", e))?;
    jsonschema::draft7::new(&schema).map_err(|e| format!("Invalid embedded schema: {}", e))
});

/// Validate one nested school document against the embedded schema.
///
/// The schema is compiled once and shared by every call.
pub fn validate_school_document(document: &Value) -> Result<(), Vec<String>> {
    let validator = DOCUMENT_VALIDATOR.as_ref().map_err(|e| vec![e.clone()])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_school_document(document: &Value) -> bool {
    validate_school_document(document).is_ok()
}

/// Schema-check every document, one warning per violating document.
///
/// Warnings are indexed like those of
/// [`records_from_documents`](crate::ingest::records_from_documents).
pub fn check_documents(documents: &[Value]) -> Vec<RecordWarning> {
    documents
        .iter()
        .zip(crate::ingest::first_entry_indices(documents))
        .enumerate()
        .filter_map(|(i, (doc, first_entry))| {
            let errors = validate_school_document(doc).err()?;
            let mut warning = RecordWarning::new(
                first_entry,
                WarningKind::SchemaViolation,
                format!("document does not match schema: {}", errors.join("; ")),
            )
            .in_document(i);
            if let Some(id) = crate::ingest::numbers::text_value(doc.get("schoolId")) {
                warning = warning.for_school(id);
            }
            Some(warning)
        })
        .collect()
}

// =============================================================================
// Record checks
// =============================================================================

/// Consistency checks on normalized records.
///
/// A school is unlocated when its first record, the one that places it on
/// the map, has no usable coordinates. It is reported once, not once per year.
pub fn check_records(records: &[DemographicRecord]) -> Vec<RecordWarning> {
    let mut warnings = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (i, record) in records.iter().enumerate() {
        if !record.total_is_consistent() {
            warnings.push(
                RecordWarning::new(
                    i,
                    WarningKind::TotalMismatch,
                    format!(
                        "supplied total {} differs from category sum {} for {}; using the sum",
                        record.reported_total.unwrap_or_default(),
                        record.total(),
                        record.year.short
                    ),
                )
                .for_school(&record.school_id),
            );
        }

        if seen.insert(record.school_id.as_str()) && !record.info.coordinates.is_located() {
            warnings.push(
                RecordWarning::new(i, WarningKind::Unlocated, "school has no usable coordinates")
                    .for_school(&record.school_id),
            );
        }

        if !record.year.is_well_formed() {
            warnings.push(
                RecordWarning::new(
                    i,
                    WarningKind::UnusualYear,
                    format!("year label '{}' is not of the form NN-NN", record.year.short),
                )
                .for_school(&record.school_id),
            );
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AcademicYear, Coordinates, Demographics, SchoolInfo};
    use serde_json::json;

    fn located(id: &str, year: &str, counts: Demographics) -> DemographicRecord {
        DemographicRecord::new(id, AcademicYear::new(year), counts).with_info(SchoolInfo {
            coordinates: Coordinates::new(38.5, -76.9),
            ..SchoolInfo::default()
        })
    }

    #[test]
    fn test_generic_validate() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });

        assert!(validate(&schema, &json!({ "name": "Alpha" })).is_ok());
        assert!(validate(&schema, &json!({ "age": 42 })).is_err());
        assert!(!is_valid(&schema, &json!({ "name": 1 })));
    }

    #[test]
    fn test_valid_school_document() {
        let doc = json!({
            "schoolId": "A",
            "name": "Alpha Elementary",
            "level": "E",
            "location": {
                "address": "1 Main St",
                "zipCode": "20646",
                "coordinates": { "type": "Point", "coordinates": [-76.97, { "$numberDouble": "38.52" }] }
            },
            "yearlyData": [{
                "academicYear": { "short": "13-14", "full": "2013-2014" },
                "demographics": { "white": { "$numberInt": "10" }, "black": 5, "other": "0", "hispanic": 0 }
            }]
        });
        assert!(is_valid_school_document(&doc), "{:?}", validate_school_document(&doc));
    }

    #[test]
    fn test_invalid_school_document() {
        let doc = json!({
            "schoolId": "A",
            "yearlyData": [{ "academicYear": {}, "demographics": { "white": [1] } }]
        });
        let errors = validate_school_document(&doc).unwrap_err();
        assert!(!errors.is_empty());

        let warnings = check_documents(&[doc]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::SchemaViolation);
        assert_eq!(warnings[0].school_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_total_mismatch_reported() {
        let records = vec![
            located("A", "13-14", Demographics::new(10, 5, 0, 0)).with_reported_total(15),
            located("B", "13-14", Demographics::new(1, 1, 1, 1)).with_reported_total(9),
        ];
        let warnings = check_records(&records);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::TotalMismatch);
        assert_eq!(warnings[0].record_index, 1);
        assert!(warnings[0].message.contains("sum 4"));
    }

    #[test]
    fn test_unlocated_reported_once_per_school() {
        let records = vec![
            DemographicRecord::new("A", AcademicYear::new("13-14"), Demographics::default()),
            DemographicRecord::new("A", AcademicYear::new("14-15"), Demographics::default()),
        ];
        let warnings = check_records(&records);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Unlocated);
    }

    #[test]
    fn test_unlocated_follows_first_row() {
        let unlocated = |year: &str| DemographicRecord::new("A", AcademicYear::new(year), Demographics::default());

        let placed_first = vec![located("A", "13-14", Demographics::default()), unlocated("14-15")];
        assert!(check_records(&placed_first).is_empty());

        let missing_first = vec![unlocated("13-14"), located("A", "14-15", Demographics::default())];
        let warnings = check_records(&missing_first);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Unlocated);
        assert_eq!(warnings[0].record_index, 0);
    }

    #[test]
    fn test_document_warnings_share_indices() {
        let documents = vec![
            json!({
                "name": "Nobody",
                "yearlyData": [{ "academicYear": { "short": "13-14" }, "demographics": {} }]
            }),
            json!({
                "schoolId": "B",
                "yearlyData": [{
                    "academicYear": { "short": "13-14" },
                    "demographics": { "white": "x", "black": 1, "other": 1, "hispanic": 1 }
                }]
            }),
        ];

        let schema_warnings = check_documents(&documents);
        let (_, normalize_warnings) = crate::ingest::records_from_documents(&documents);

        let schema_b = schema_warnings
            .iter()
            .find(|w| w.school_id.as_deref() == Some("B"))
            .expect("schema warning for B");
        let coerced_b = normalize_warnings
            .iter()
            .find(|w| w.kind == WarningKind::CoercedValue)
            .expect("coerced warning for B");

        assert_eq!(schema_b.record_index, coerced_b.record_index);
        assert_eq!(schema_b.document_index, Some(1));
        assert_eq!(coerced_b.document_index, Some(1));

        let skipped = &normalize_warnings[0];
        assert_eq!(skipped.kind, WarningKind::SkippedRow);
        assert_eq!(skipped.document_index, Some(0));
        assert_ne!(skipped.record_index, coerced_b.record_index);
    }

    #[test]
    fn test_embedded_schema_compiles_once() {
        assert!(DOCUMENT_VALIDATOR.is_ok());

        let documents: Vec<Value> = (0..50)
            .map(|i| json!({ "schoolId": format!("S{}", i), "name": "School", "yearlyData": [] }))
            .collect();
        assert!(documents.iter().all(is_valid_school_document));
        assert!(check_documents(&documents).is_empty());
    }

    #[test]
    fn test_unusual_year_reported() {
        let warnings = check_records(&[located("A", "2014", Demographics::default())]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnusualYear);
    }

    #[test]
    fn test_warning_display() {
        let w = RecordWarning::new(3, WarningKind::CoercedValue, "white: 'abc' is not a number")
            .for_school("A");
        assert_eq!(w.to_string(), "#3 (school A): white: 'abc' is not a number");

        let w = RecordWarning::new(0, WarningKind::SkippedRow, "document 0 has no schoolId").in_document(0);
        assert_eq!(w.to_string(), "#0 (document 0): document 0 has no schoolId");
    }
}
