use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Per-request failures. Every variant is caught at the handler boundary
/// and converted to a JSON error body; none crash the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("Rate limit exceeded. Try again later.")]
    RateLimited { retry_after_secs: u64 },
    #[error("Failed to send email: {0}")]
    Delivery(String),
    #[error("Endpoint not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "status": "error",
            "message": self.to_string(),
            "error_code": status.as_u16(),
        });
        if let ApiError::RateLimited { retry_after_secs } = self {
            body["retry_after_secs"] = json!(retry_after_secs);
        }
        (status, Json(body)).into_response()
    }
}
