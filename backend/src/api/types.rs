//! REST API types for frontend integration.
//!
//! The dashboard is returned as-is: stacked-bar data in `years`, map and
//! comparison data in `schools`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ingest::SourceInfo;
use crate::transform::pipeline::Dashboard;

/// Response sent to the frontend after an upload or remote fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning", "empty"
    pub status: String,

    pub generated_at: DateTime<Utc>,

    pub dashboard: Dashboard,

    pub metadata: ResponseMetadata,
}

/// Counts the frontend shows next to the charts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub school_count: usize,
    pub year_count: usize,
    /// Schools left off the map.
    pub unlocated_schools: usize,
    pub warning_count: usize,
    pub source: SourceInfo,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        let status = if dashboard.is_empty() {
            "empty"
        } else if dashboard.warnings.is_empty() {
            "ready"
        } else {
            "warning"
        };

        let metadata = ResponseMetadata {
            school_count: dashboard.schools.len(),
            year_count: dashboard.years.len(),
            unlocated_schools: dashboard.schools.len() - dashboard.located_schools().count(),
            warning_count: dashboard.warnings.len(),
            source: dashboard.source.clone(),
        };

        DashboardResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            generated_at: Utc::now(),
            dashboard,
            metadata,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "generatedAt": Utc::now(),
        "dashboard": null,
        "metadata": null
    })
}
