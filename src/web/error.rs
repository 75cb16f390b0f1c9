//! Mapping of library errors to HTTP responses
//!
//! Client mistakes become 400s with their own message; store outages and
//! everything unclassified become 500s with a fixed message, logged in full.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use super::html;
use crate::error::SatError;

pub const CONNECTION_MESSAGE: &str = "Error de conexión a la base de datos";
pub const INTERNAL_MESSAGE: &str = "Error interno del servidor";

/// Status code and user-facing message for an error
pub fn status_and_message(err: &SatError) -> (StatusCode, String) {
    match err {
        SatError::InvalidTable(_) => (StatusCode::BAD_REQUEST, "Tabla no válida".to_string()),
        SatError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
        SatError::EmptyInput => (StatusCode::BAD_REQUEST, err.to_string()),
        SatError::Connection(detail) => {
            error!("Store unreachable: {}", detail);
            (StatusCode::INTERNAL_SERVER_ERROR, CONNECTION_MESSAGE.to_string())
        }
        other => {
            error!("Unhandled error: {} ({:?})", other, other);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

impl IntoResponse for SatError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self);
        (status, html::error_page(status, &message)).into_response()
    }
}

/// JSON flavour for the `/api` routes
#[derive(Debug)]
pub struct ApiError(pub SatError);

impl From<SatError> for ApiError {
    fn from(err: SatError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self.0);
        (status, Json(json!({ "error": message }))).into_response()
    }
}
