//! # Schoolmix - school race/ethnicity counts, by year and by school
//!
//! Schoolmix loads per-school, per-year enrollment counts broken down into
//! four categories (white, black, other, hispanic) and derives two views:
//! a stacked total per academic year and a before/after snapshot per school.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  CSV / JSON │────▶│   Ingest    │────▶│  Aggregator │────▶│  years (stacked) │
//! │  or the API │     │ (normalize) │──┐  └─────────────┘     └──────────────────┘
//! └─────────────┘     └─────────────┘  │  ┌─────────────┐     ┌──────────────────┐
//!                                      └─▶│   Joiner    │────▶│ schools (map)    │
//!                                         └─────────────┘     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schoolmix::{build_dashboard, load_path, DashboardOptions};
//!
//! let ingested = load_path("ccps_data.csv".as_ref()).unwrap();
//! let dashboard = build_dashboard(ingested, &DashboardOptions::default());
//! println!("{} schools over {} years", dashboard.schools.len(), dashboard.years.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment settings
//! - [`models`] - Domain models (Demographics, DemographicRecord, SchoolSummary)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`ingest`] - CSV rows and school documents to records
//! - [`validation`] - Schema and consistency checks
//! - [`transform`] - Aggregation, joining, and pipeline
//! - [`client`] - Remote schools API
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod ingest;
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Remote data
pub mod client;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ClientError, ConfigError, IngestError, PipelineError, ServerError};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{Settings, DEFAULT_COMPARISON_YEAR};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AcademicYear,
    Category,
    Coordinates,
    DemographicRecord,
    Demographics,
    LegendEntry,
    SchoolInfo,
    SchoolLevel,
    SchoolSummary,
    Snapshot,
    StackSegment,
    YearlyAggregate,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_json,
    parse_csv_file_auto,
    parse_bytes_auto,
    parse_bytes_with_delimiter,
    detect_encoding,
    detect_delimiter,
    decode_content,
    CsvError,
    ParseResult,
};

// =============================================================================
// Re-exports - Ingestion
// =============================================================================

pub use ingest::{
    detect_format,
    documents_from_json,
    records_from_documents,
    records_from_rows,
    Ingested,
    SourceFormat,
    SourceInfo,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    check_documents,
    check_records,
    is_valid,
    is_valid_school_document,
    validate,
    validate_school_document,
    RecordWarning,
    WarningKind,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    aggregate_by_year,
    available_years,
    join_schools,
    stack_segments,
    BeforePolicy,
    ComparisonYear,
    DuplicatePolicy,
    JoinOptions,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_dashboard,
    fetch_dashboard,
    load_bytes,
    load_csv_bytes,
    load_csv_file,
    load_documents,
    load_json_str,
    load_path,
    load_payload,
    Dashboard,
    DashboardOptions,
};

// =============================================================================
// Re-exports - Client & API
// =============================================================================

pub use client::SchoolApiClient;

pub use api::types::{error_response, DashboardResponse, ResponseMetadata};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
