//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No usable caller identity on the request.
    Unauthorized(String),
    /// The caller lacks a required permission.
    Forbidden(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error from the inventory and order services.
    Fulfillment(FulfillmentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
        };

        let body = serde_json::json!({ "status": "error", "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match &err {
        FulfillmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        FulfillmentError::Validation(_) | FulfillmentError::InsufficientStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        FulfillmentError::Forbidden(_) => StatusCode::FORBIDDEN,
        FulfillmentError::ResourceBusy { .. }
        | FulfillmentError::LockExpired
        | FulfillmentError::InvalidStateTransition { .. }
        | FulfillmentError::DuplicateKey(_) => StatusCode::CONFLICT,
        FulfillmentError::Store(_) | FulfillmentError::Lock(_) => {
            tracing::error!(error = %err, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}
