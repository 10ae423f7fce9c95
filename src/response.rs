use crate::error::{NetworkError, NetworkResult};
use actix_web::{HttpResponse, http::StatusCode};
use log::{error, warn};
use serde::Serialize;

impl NetworkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NetworkError::Validation(_) => StatusCode::BAD_REQUEST,
            NetworkError::Precondition(_) => StatusCode::CONFLICT,
            NetworkError::Apply { .. } | NetworkError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            NetworkError::PostValidation { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Trait for converting service results into HTTP responses
pub trait ServiceResultResponse {
    fn into_response(self) -> HttpResponse;
}

impl<T> ServiceResultResponse for T
where
    T: Serialize,
{
    fn into_response(self) -> HttpResponse {
        match serde_json::to_string(&self) {
            Ok(json) => HttpResponse::Ok()
                .content_type("application/json")
                .body(json),
            Err(e) => {
                error!("failed to serialize response: {e:#}");
                HttpResponse::InternalServerError().body("failed to serialize response")
            }
        }
    }
}

/// Convert an operation result into a response
///
/// Data is returned as JSON with status 200. Errors are logged and returned as
/// their display string with the status of their kind; caller mistakes are
/// logged as warnings, everything else as errors.
pub fn handle_service_result<T>(result: NetworkResult<T>, operation: &str) -> HttpResponse
where
    T: ServiceResultResponse,
{
    match result {
        Ok(data) => data.into_response(),
        Err(e) => {
            let status = e.status_code();
            if status.is_client_error() {
                warn!("{operation} rejected: {e:#}");
            } else {
                error!("{operation} failed: {e:#}");
            }
            HttpResponse::build(status).body(e.to_string())
        }
    }
}
