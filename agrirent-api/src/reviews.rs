use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use agrirent_booking::Review;
use agrirent_core::Principal;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

/// POST /v1/bookings/:id/review
/// One review per completed booking, renter only.
pub async fn submit(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let review = state
        .reviews
        .submit(&principal, booking_id, req.rating, req.comment)
        .await?;
    Ok(Json(review))
}
