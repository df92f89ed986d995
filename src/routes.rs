//! HTTP routes for the scanner service.
//!
//! Thin JSON mapping over the shared state: job control, status
//! polling, the cached scan result (JSON and CSV), and the stored
//! scan/score history. Errors serialize as `{error, message}` with a
//! status code from the error taxonomy.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::data::{DataStatus, ScanRecord, ScoreHistoryPoint};
use crate::error::ScannerError;
use crate::job::JobSnapshot;
use crate::scan::{ScanParams, ScanReport, ScanResult};
use crate::ScannerState;

// ============================================================================
// Error Mapping
// ============================================================================

/// Wire form of a failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub error: String,
    /// Human-readable description
    pub message: String,
}

/// Axum-facing wrapper turning `ScannerError` into an HTTP response.
pub struct ApiError(ScannerError);

impl From<ScannerError> for ApiError {
    fn from(err: ScannerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self.0 {
            ScannerError::InvalidParameters(_) => "invalid_parameters",
            ScannerError::AlreadyRunning => "already_running",
            ScannerError::NoDataAvailable => "no_data_available",
            ScannerError::NoResultAvailable => "no_result_available",
            ScannerError::UpstreamFetch(_) => "upstream_fetch_failure",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanHistoryQuery {
    /// Most recent scans to return
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct ScanHistoryResponse {
    pub scans: Vec<ScanRecord>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScoreHistoryQuery {
    /// Days of score trajectory to return
    #[serde(default = "default_history_days")]
    pub days: usize,
}

fn default_history_days() -> usize {
    30
}

#[derive(Debug, Serialize)]
pub struct ScoreHistoryResponse {
    pub ticker: String,
    pub points: Vec<ScoreHistoryPoint>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "hqm-scanner".to_string(),
    })
}

/// Freshness of the snapshot cache.
pub async fn data_status(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<DataStatus>, ApiError> {
    let status = state.store.data_status().await?;
    Ok(Json(status))
}

/// Trigger a background refresh of the snapshot cache.
pub async fn start_refresh(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let snapshot = state.start_refresh().await?;
    Ok(Json(snapshot))
}

/// Trigger a background scan over the cached universe.
pub async fn start_scan(
    State(state): State<Arc<ScannerState>>,
    Json(params): Json<ScanParams>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let snapshot = state.start_scan(params).await?;
    Ok(Json(snapshot))
}

/// Poll the job slot.
pub async fn job_status(State(state): State<Arc<ScannerState>>) -> Json<JobSnapshot> {
    Json(state.jobs.status().await)
}

/// Last successful scan result as JSON.
pub async fn scan_result(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<ScanResult>, ApiError> {
    let result = state.jobs.result().await?;
    Ok(Json(result.as_ref().clone()))
}

/// Last successful scan result as CSV.
pub async fn scan_result_csv(
    State(state): State<Arc<ScannerState>>,
) -> Result<Response, ApiError> {
    let result = state.jobs.result().await?;
    let csv = ScanReport::new(&result).to_csv();

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"hqm_scan.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Recent scans, newest first.
pub async fn scan_history(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<ScanHistoryQuery>,
) -> Result<Json<ScanHistoryResponse>, ApiError> {
    let scans = state.store.scan_history(query.limit).await?;
    let count = scans.len();
    Ok(Json(ScanHistoryResponse { scans, count }))
}

/// Score trajectory for one ticker, newest first.
pub async fn score_history(
    State(state): State<Arc<ScannerState>>,
    Path(ticker): Path<String>,
    Query(query): Query<ScoreHistoryQuery>,
) -> Result<Json<ScoreHistoryResponse>, ApiError> {
    let ticker = ticker.to_uppercase();
    let points = state.store.score_history(&ticker, query.days).await?;
    Ok(Json(ScoreHistoryResponse { ticker, points }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_taxonomy() {
        let cases = [
            (
                ScannerError::InvalidParameters("bad".into()),
                "invalid_parameters",
                400,
            ),
            (ScannerError::AlreadyRunning, "already_running", 409),
            (ScannerError::NoDataAvailable, "no_data_available", 404),
            (ScannerError::NoResultAvailable, "no_result_available", 404),
            (
                ScannerError::UpstreamFetch("down".into()),
                "upstream_fetch_failure",
                502,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(ApiError(err).code(), code);
        }
    }

    #[test]
    fn test_error_body_shape() {
        let api_err = ApiError(ScannerError::NoDataAvailable);
        let body = ErrorBody {
            error: api_err.code().to_string(),
            message: api_err.0.to_string(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "no_data_available");
        assert!(json["message"].as_str().unwrap().contains("refresh"));
    }

    #[test]
    fn test_query_defaults() {
        let query: ScanHistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);

        let query: ScoreHistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.days, 30);
    }
}
