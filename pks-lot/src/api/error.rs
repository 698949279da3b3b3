//! Mapping of service errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pks_common::Error;
use serde_json::json;
use tracing::error;

/// Handler error wrapper
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            Error::VehicleNotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": self.0.to_string() }),
            ),
            Error::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "msg": msg }),
            ),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": other.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
