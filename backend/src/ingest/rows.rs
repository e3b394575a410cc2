//! Flat CSV rows → records.
//!
//! Expected columns: `school_id, school, address, city, state, zip, level,
//! latitude, longitude, short_year, white, black, other, hispanic, total`.
//! A `year` column with the full label is used when `short_year` is empty.

use serde_json::Value;

use super::numbers::{coerce_coordinate, text_value};
use super::{read_counts, read_total};
use crate::models::{AcademicYear, Coordinates, DemographicRecord, SchoolInfo, SchoolLevel};
use crate::validation::{RecordWarning, WarningKind};

fn text(row: &Value, key: &str) -> String {
    text_value(row.get(key)).unwrap_or_default()
}

/// Normalize parsed CSV rows. Rows without a school id or year are skipped.
pub fn records_from_rows(rows: &[Value]) -> (Vec<DemographicRecord>, Vec<RecordWarning>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(school_id) = text_value(row.get("school_id")) else {
            warnings.push(RecordWarning::new(index, WarningKind::SkippedRow, "row has no school_id"));
            continue;
        };

        let short = text_value(row.get("short_year"));
        let full = text_value(row.get("year"));
        let Some(year) = AcademicYear::from_labels(short.as_deref(), full.as_deref()) else {
            warnings.push(
                RecordWarning::new(index, WarningKind::SkippedRow, "row has no short_year")
                    .for_school(&school_id),
            );
            continue;
        };

        let counts = read_counts(row, |c| c.key(), index, &school_id, &mut warnings);

        let info = SchoolInfo {
            name: text(row, "school"),
            address: text(row, "address"),
            city: text(row, "city"),
            state: text(row, "state"),
            zip: text(row, "zip"),
            level: SchoolLevel::parse(&text(row, "level")),
            coordinates: Coordinates::new(
                coerce_coordinate(row.get("latitude")),
                coerce_coordinate(row.get("longitude")),
            ),
        };

        let mut record = DemographicRecord::new(school_id, year, counts).with_info(info);
        record.reported_total = read_total(row, "total");
        records.push(record);
    }

    (records, warnings)
}
