//! Error types for the schoolmix pipeline.
//!
//! One enum per layer:
//!
//! - [`crate::parser::CsvError`] - CSV parsing errors (line-level context)
//! - [`IngestError`] - JSON document normalization errors
//! - [`ClientError`] - remote school API errors
//! - [`ConfigError`] - invalid environment settings
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Malformed *values* inside otherwise readable input are never errors:
//! they are coerced and reported as [`crate::validation::RecordWarning`]s.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning a JSON payload into school documents.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is JSON but neither a document nor an array of documents.
    #[error("Expected a school document or an array of documents, found {0}")]
    UnexpectedShape(String),
}

// =============================================================================
// Remote API Errors
// =============================================================================

/// Errors from the remote school API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A setting required to reach the API is not configured.
    #[error("Missing {0} environment variable")]
    MissingSetting(&'static str),

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors of [`crate::transform::pipeline`].
///
/// An empty input is not an error: it yields an empty dashboard.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("API error: {0}")]
    Client(#[from] ClientError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type IngestResult<T> = Result<T, IngestError>;

pub type ClientResult<T> = Result<T, ClientError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::new(3, "Cannot read line");
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("Line 3"));

        let ingest_err = IngestError::UnexpectedShape("a number".into());
        let pipeline_err: PipelineError = ingest_err.into();
        assert!(pipeline_err.to_string().contains("a number"));

        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().starts_with("Pipeline error"));
    }

    #[test]
    fn test_client_error_format() {
        let err = ClientError::Status {
            status: 403,
            body: "forbidden".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("forbidden"));

        let err = ClientError::MissingSetting("SCHOOLMIX_API_KEY");
        assert!(err.to_string().contains("SCHOOLMIX_API_KEY"));
    }

    #[test]
    fn test_config_error_format() {
        let err = ConfigError::InvalidValue {
            key: "SCHOOLMIX_PORT",
            value: "abc".into(),
            message: "not a port number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'abc' for SCHOOLMIX_PORT: not a port number"
        );
    }
}
