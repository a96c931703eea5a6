use agrirent_core::BookingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// HTTP envelope over the core error taxonomy. Every caller-facing
/// rejection keeps the precondition-specific message; only backend faults
/// collapse to a generic 500.
#[derive(Debug)]
pub struct ApiError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            BookingError::BookingNotFound(_) | BookingError::EquipmentNotFound(_) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            BookingError::Forbidden(_) | BookingError::NotVerified => {
                (StatusCode::FORBIDDEN, self.0.to_string())
            }
            BookingError::InvalidState { .. } => (StatusCode::CONFLICT, self.0.to_string()),
            BookingError::EquipmentUnavailable
            | BookingError::SelfBookingForbidden
            | BookingError::InvalidInterval
            | BookingError::InvalidToken
            | BookingError::Validation(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            BookingError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            BookingError::Store(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
