//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;

/// API-level error type that maps to HTTP responses.
///
/// The JSON body is always `{"code": ..., "error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by the inventory layer.
    Inventory(InventoryError),
    /// Malformed request outside the inventory layer (path ids, body shape).
    BadRequest(String),
    /// A report matched no movements.
    ReportNotFound,
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Caller identity lacks the required role.
    Forbidden(String),
}

impl ApiError {
    /// Stable outcome code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Inventory(err) => err.code(),
            ApiError::BadRequest(_) => "VALIDATION_FAILED",
            ApiError::ReportNotFound => "REPORT_NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Inventory(err) => inventory_status(err),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ReportNotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
        InventoryError::ProductNotFound(_) | InventoryError::MovementNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        InventoryError::InsufficientStock { .. } => StatusCode::CONFLICT,
        InventoryError::Infrastructure(_) if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        InventoryError::Infrastructure(_) | InventoryError::Export(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Inventory(InventoryError::Infrastructure(err)) => {
                tracing::error!(error = %err, retryable = err.is_retryable(), "infrastructure error");
                if err.is_retryable() {
                    "service temporarily unavailable, retry the request".to_string()
                } else {
                    "internal server error".to_string()
                }
            }
            ApiError::Inventory(err @ InventoryError::Export(_)) => {
                tracing::error!(error = %err, "report export failed");
                "internal server error".to_string()
            }
            ApiError::Inventory(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                msg.clone()
            }
            ApiError::ReportNotFound => "report not found".to_string(),
        };

        let body = serde_json::json!({ "code": self.code(), "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}
