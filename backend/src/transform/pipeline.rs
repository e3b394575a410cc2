//! High-level pipeline: load, normalize, check, then build both views.
//!
//! ```text
//! CSV / JSON bytes ──▶ Ingested { records, warnings } ──┬──▶ aggregate_by_year ──▶ years
//! API payload     ──┘                                   └──▶ join_schools      ──▶ schools
//! ```
//!
//! Every load is a full rebuild; nothing is carried over between calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use schoolmix::{build_dashboard, load_path, DashboardOptions};
//!
//! let ingested = load_path("data/ccps_data.csv".as_ref())?;
//! let dashboard = build_dashboard(ingested, &DashboardOptions::default());
//! println!("{} years, {} schools", dashboard.years.len(), dashboard.schools.len());
//! ```

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use super::aggregator::{aggregate_by_year, legend, max_total};
use super::joiner::{available_years, join_schools, JoinOptions};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::client::SchoolApiClient;
use crate::error::PipelineResult;
use crate::ingest::{
    detect_format, documents_from_json, records_from_documents, records_from_rows, Ingested, SourceFormat,
    SourceInfo,
};
use crate::models::{LegendEntry, SchoolSummary, YearlyAggregate};
use crate::parser::{parse_bytes_auto, parse_bytes_with_delimiter, parse_csv_file_auto, ParseResult};
use crate::validation::{check_documents, check_records, RecordWarning};

/// Warnings printed per kind before the log output is truncated.
const WARNINGS_SHOWN: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DashboardOptions {
    pub join: JoinOptions,
    /// Skip record consistency checks (ingestion warnings are kept).
    pub skip_validation: bool,
}

/// Both derived views plus what was learned while building them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub years: Vec<YearlyAggregate>,
    pub categories: Vec<LegendEntry>,
    pub schools: Vec<SchoolSummary>,
    pub available_years: Vec<String>,
    pub comparison_year: String,
    pub record_count: usize,
    pub source: SourceInfo,
    pub warnings: Vec<RecordWarning>,
}

impl Dashboard {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Largest yearly total, for the chart's y-domain.
    pub fn max_total(&self) -> u64 {
        max_total(&self.years)
    }

    /// Schools that can be placed on the map.
    pub fn located_schools(&self) -> impl Iterator<Item = &SchoolSummary> {
        self.schools.iter().filter(|s| s.info.coordinates.is_located())
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load a CSV or JSON file, sniffing the format from its content.
pub fn load_path(path: &Path) -> PipelineResult<Ingested> {
    log_info(format!("Reading {}", path.display()));
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes)
}

/// Load a CSV file with encoding and delimiter auto-detection.
pub fn load_csv_file(path: &Path) -> PipelineResult<Ingested> {
    log_info(format!("Reading CSV {}", path.display()));
    Ok(ingest_csv(parse_csv_file_auto(path)?))
}

/// Load CSV or JSON bytes, sniffing the format.
pub fn load_bytes(bytes: &[u8]) -> PipelineResult<Ingested> {
    match detect_format(bytes) {
        SourceFormat::Json => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim_start_matches('\u{feff}');
            load_json_str(text)
        }
        SourceFormat::Csv => load_csv_bytes(bytes, None),
    }
}

/// Load CSV bytes; `delimiter` overrides auto-detection.
pub fn load_csv_bytes(bytes: &[u8], delimiter: Option<char>) -> PipelineResult<Ingested> {
    let parsed = match delimiter {
        Some(d) => parse_bytes_with_delimiter(bytes, d)?,
        None => parse_bytes_auto(bytes)?,
    };
    Ok(ingest_csv(parsed))
}

fn ingest_csv(parsed: ParseResult) -> Ingested {
    log_success(format!(
        "CSV: {} rows, encoding {}, delimiter '{}'",
        parsed.records.len(),
        parsed.encoding,
        format_delimiter(parsed.delimiter)
    ));

    let (records, warnings) = records_from_rows(&parsed.records);
    Ingested {
        records,
        warnings,
        source: SourceInfo {
            format: SourceFormat::Csv,
            encoding: Some(parsed.encoding),
            delimiter: Some(parsed.delimiter),
            columns: parsed.headers,
            row_count: parsed.records.len(),
        },
    }
}

/// Load a JSON payload: one school document or an array of them.
pub fn load_json_str(text: &str) -> PipelineResult<Ingested> {
    let value: Value = serde_json::from_str(text).map_err(crate::error::IngestError::from)?;
    load_payload(value)
}

/// Normalize an already-decoded JSON payload (e.g. from the API client).
pub fn load_payload(payload: Value) -> PipelineResult<Ingested> {
    let documents = documents_from_json(payload)?;
    Ok(load_documents(&documents))
}

/// Schema-check, then flatten school documents.
pub fn load_documents(documents: &[Value]) -> Ingested {
    log_success(format!("JSON: {} school documents", documents.len()));

    let mut warnings = check_documents(documents);
    let (records, normalize_warnings) = records_from_documents(documents);
    warnings.extend(normalize_warnings);

    Ingested {
        records,
        warnings,
        source: SourceInfo {
            format: SourceFormat::Json,
            encoding: None,
            delimiter: None,
            columns: Vec::new(),
            row_count: documents.len(),
        },
    }
}

// =============================================================================
// Building
// =============================================================================

/// Build the stacked-bar and before/after views from normalized records.
///
/// Never fails: an empty input gives an empty dashboard.
pub fn build_dashboard(ingested: Ingested, options: &DashboardOptions) -> Dashboard {
    let Ingested {
        records,
        mut warnings,
        source,
    } = ingested;

    log_success(format!("{} demographic records", records.len()));

    if !options.skip_validation {
        warnings.extend(check_records(&records));
    }
    print_warnings(&warnings);

    if records.is_empty() {
        log_warning("No records: nothing to chart");
    }

    log_info("Aggregating by academic year...");
    let years = aggregate_by_year(&records);
    log_success(format!("{} academic years", years.len()));

    log_info(format!("Joining schools (comparison year: {})...", options.join.comparison_year));
    let schools = join_schools(&records, &options.join);
    let compared = schools.iter().filter(|s| s.has_comparison()).count();
    log_success(format!("{} schools, {} with comparison data", schools.len(), compared));

    Dashboard {
        categories: legend(&years),
        available_years: available_years(&records),
        comparison_year: options.join.comparison_year.to_string(),
        record_count: records.len(),
        years,
        schools,
        source,
        warnings,
    }
}

/// Fetch school documents from the API and build the dashboard.
pub async fn fetch_dashboard(client: &SchoolApiClient, options: &DashboardOptions) -> PipelineResult<Dashboard> {
    let payload = client.fetch_schools().await?;
    let ingested = load_payload(payload)?;
    Ok(build_dashboard(ingested, options))
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

fn print_warnings(warnings: &[RecordWarning]) {
    if warnings.is_empty() {
        return;
    }
    log_warning(format!("{} warnings", warnings.len()));

    let mut by_kind: Vec<(crate::validation::WarningKind, Vec<&RecordWarning>)> = Vec::new();
    for w in warnings {
        match by_kind.iter_mut().find(|(kind, _)| *kind == w.kind) {
            Some((_, list)) => list.push(w),
            None => by_kind.push((w.kind, vec![w])),
        }
    }

    for (kind, list) in by_kind {
        log_warning_indent(format!("{:?}: {}", kind, list.len()), 1);
        for w in list.iter().take(WARNINGS_SHOWN) {
            log_info_indent(w.to_string(), 2);
        }
        if list.len() > WARNINGS_SHOWN {
            log_info_indent(format!("... +{}", list.len() - WARNINGS_SHOWN), 2);
        }
    }
}
