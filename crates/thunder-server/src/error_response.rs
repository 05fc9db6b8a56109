//! Maps `ThunderError` to an HTTP response (§7 "Each kind maps to one HTTP
//! status at the façade").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thunder_model::ThunderError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    error_description: String,
}

pub struct ApiError(pub ThunderError);

impl From<ThunderError> for ApiError {
    fn from(err: ThunderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: format!("{:?}", self.0.kind),
            error_description: self.0.message,
        };
        (status, Json(body)).into_response()
    }
}
