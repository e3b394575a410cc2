//! HTTP Server for the schoolmix API.
//!
//! Serves dashboard data to the charting frontend. Rendering stays in the
//! browser; this side only loads, aggregates and joins.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                   |
//! |--------|-------------------|-----------------------------------------------|
//! | GET    | `/health`         | Health check                                  |
//! | POST   | `/api/upload`     | Upload CSV/JSON, get the dashboard back       |
//! | GET    | `/api/dashboard`  | Dashboard built from the remote schools API   |
//! | GET    | `/api/logs`       | SSE stream for real-time logs                 |
//!
//! Any other path falls through to the static directory when one is given.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, DashboardResponse};
use crate::client::SchoolApiClient;
use crate::config::{Settings, MAX_UPLOAD_SIZE};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::joiner::{ComparisonYear, JoinOptions};
use crate::transform::pipeline::{build_dashboard, fetch_dashboard, load_bytes, DashboardOptions};

struct AppState {
    settings: Settings,
}

type SharedState = Arc<AppState>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::Csv(_) | PipelineError::Ingest(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Pipeline(PipelineError::Client(_)) => StatusCode::BAD_GATEWAY,
            ServerError::Pipeline(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log_error(self.to_string());
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the application router.
pub fn router(settings: Settings, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = Arc::new(AppState { settings });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/dashboard", get(remote_dashboard))
        .route("/api/logs", get(sse_logs));

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(health)),
    };

    app.layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings, static_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let has_api = settings.has_api();
    let app = router(settings, static_dir.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    log_success(format!("schoolmix server running on http://localhost:{}", port));
    log_info("POST /api/upload    - Upload CSV or JSON");
    if has_api {
        log_info("GET  /api/dashboard - Dashboard from the schools API");
    }
    log_info("GET  /api/logs      - SSE log stream");
    log_info("GET  /health        - Health check");
    if let Some(dir) = static_dir {
        log_info(format!("Serving static files from {}", dir.display()));
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "schoolmix",
        "version": env!("CARGO_PKG_VERSION"),
        "remoteApi": state.settings.has_api(),
        "endpoints": {
            "upload": "POST /api/upload",
            "dashboard": "GET /api/dashboard",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers drop the missed entries.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Options for one request, falling back to the configured comparison year.
fn dashboard_options(settings: &Settings, comparison_year: Option<&str>) -> DashboardOptions {
    let year = comparison_year
        .map(str::trim)
        .filter(|y| !y.is_empty())
        .unwrap_or(settings.comparison_year.as_str());

    DashboardOptions {
        join: JoinOptions {
            comparison_year: ComparisonYear::parse(year),
            ..JoinOptions::default()
        },
        ..DashboardOptions::default()
    }
}

/// Upload endpoint: multipart `file` plus optional `comparisonYear`.
async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> ServerResult<Json<DashboardResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut comparison_year: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "comparisonYear" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                comparison_year = Some(text);
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    log_info(format!(
        "Upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = dashboard_options(&state.settings, comparison_year.as_deref());
    let ingested = load_bytes(&bytes)?;
    let dashboard = build_dashboard(ingested, &options);

    Ok(Json(DashboardResponse::from(dashboard)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardQuery {
    comparison_year: Option<String>,
}

/// Dashboard from the remote schools API.
async fn remote_dashboard(
    State(state): State<SharedState>,
    Query(query): Query<DashboardQuery>,
) -> ServerResult<Json<DashboardResponse>> {
    if !state.settings.has_api() {
        return Err(ServerError::BadRequest("Remote schools API is not configured".to_string()));
    }

    let client = SchoolApiClient::from_settings(&state.settings).map_err(PipelineError::from)?;
    let options = dashboard_options(&state.settings, query.comparison_year.as_deref());
    let dashboard = fetch_dashboard(&client, &options).await?;

    Ok(Json(DashboardResponse::from(dashboard)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "schoolmix-test-boundary";

    async fn spawn(settings: Settings) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(settings, None)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn multipart_body(file: &str, comparison_year: Option<&str>) -> String {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"schools.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{file}\r\n",
            b = BOUNDARY
        );
        if let Some(year) = comparison_year {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"comparisonYear\"\r\n\r\n{year}\r\n",
                b = BOUNDARY
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    async fn post_upload(base: &str, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/api/upload", base))
            .header("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(body)
            .send()
            .await
            .unwrap()
    }

    const CSV: &str = "school_id,school,latitude,longitude,short_year,white,black,other,hispanic\n\
        A,Alpha,38.52,-76.97,13-14,10,5,0,0\n\
        A,Alpha,38.52,-76.97,15-16,8,6,0,0\n";

    #[test]
    fn test_dashboard_options_fallback() {
        let settings = Settings::default();
        let options = dashboard_options(&settings, None);
        assert_eq!(options.join.comparison_year, ComparisonYear::Label("14-15".into()));

        let options = dashboard_options(&settings, Some("  "));
        assert_eq!(options.join.comparison_year, ComparisonYear::Label("14-15".into()));

        let options = dashboard_options(&settings, Some("latest"));
        assert_eq!(options.join.comparison_year, ComparisonYear::Latest);
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(Settings::default()).await;
        let json: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();

        assert_eq!(json["status"], "ok");
        assert_eq!(json["remoteApi"], false);
    }

    #[tokio::test]
    async fn test_upload_builds_dashboard() {
        let base = spawn(Settings::default()).await;
        let response = post_upload(&base, multipart_body(CSV, Some("15-16"))).await;
        assert_eq!(response.status(), 200);

        let json: Value = response.json().await.unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["dashboard"]["comparisonYear"], "15-16");
        assert_eq!(json["dashboard"]["years"].as_array().unwrap().len(), 2);
        assert_eq!(json["dashboard"]["schools"][0]["after"]["total"], 14);
    }

    #[tokio::test]
    async fn test_upload_errors() {
        let base = spawn(Settings::default()).await;

        let no_file = format!("--{b}\r\nContent-Disposition: form-data; name=\"comparisonYear\"\r\n\r\n14-15\r\n--{b}--\r\n", b = BOUNDARY);
        let response = post_upload(&base, no_file).await;
        assert_eq!(response.status(), 400);
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["status"], "error");

        let response = post_upload(&base, multipart_body("[{\"schoolId\": ", None)).await;
        assert_eq!(response.status(), 422);
    }

    #[tokio::test]
    async fn test_remote_dashboard_requires_configuration() {
        let base = spawn(Settings::default()).await;
        let response = reqwest::get(format!("{}/api/dashboard", base)).await.unwrap();
        assert_eq!(response.status(), 400);
    }
}
