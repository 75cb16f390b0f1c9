//! JSON endpoints under `/api`

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::db::{self, LoadRecord};
use crate::queries::{self, TaxpayerRecord};

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// GET /api/health - Health check
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/contribuyente/:rfc - every row matching the RFC, tagged with `tabla_origen`
pub async fn taxpayer(
    State(state): State<AppState>,
    Path(rfc): Path<String>,
) -> Result<Json<Vec<TaxpayerRecord>>, ApiError> {
    let records = state
        .with_conn(move |conn| queries::search_by_rfc(conn, &rfc))
        .await?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

const DEFAULT_HISTORY_LIMIT: usize = 100;

/// GET /api/historial - recent CSV imports
pub async fn load_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<Vec<LoadRecord>>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let records = state
        .with_conn(move |conn| db::get_load_history(conn, limit))
        .await?;

    Ok(Json(ApiResponse::ok(records)))
}
