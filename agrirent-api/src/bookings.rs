use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agrirent_booking::models::{Booking, BookingStatus, DamageReport, PaymentStatus, RentalPhoto};
use agrirent_booking::{CreateBooking, PhotoUpload, Quote};
use agrirent_core::Principal;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub equipment_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyHandoverRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct DamageReportRequest {
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadPhotosRequest {
    pub photos: Vec<PhotoUpload>,
}

#[derive(Debug, Serialize)]
pub struct UploadPhotosResponse {
    pub uploaded: usize,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub display_start: NaiveTime,
    pub display_end: NaiveTime,
    pub hours: i64,
    pub price_per_hour: i64,
    pub subtotal: i64,
    pub platform_fee: i64,
    pub gst: i64,
    pub total_amount: i64,
    /// Only present for the renter: the code they read out at pickup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handover_token: Option<String>,
    pub handover_verified_at: Option<DateTime<Utc>>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub damage_report: Option<DamageReport>,
    pub rental_photos: Vec<RentalPhoto>,
    pub return_confirmed_by_renter: bool,
    pub return_confirmed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingResponse {
    /// The handover code is the renter's secret; the lender learns it in
    /// person at pickup, never from the API.
    pub fn for_viewer(booking: Booking, viewer_id: Uuid) -> Self {
        let handover_token = if booking.renter_id == viewer_id {
            Some(booking.handover_token.clone())
        } else {
            None
        };
        Self {
            id: booking.id,
            equipment_id: booking.equipment_id,
            renter_id: booking.renter_id,
            owner_id: booking.owner_id,
            start: booking.start,
            end: booking.end,
            display_start: booking.display_start,
            display_end: booking.display_end,
            hours: booking.hours,
            price_per_hour: booking.price_per_hour,
            subtotal: booking.subtotal,
            platform_fee: booking.platform_fee,
            gst: booking.gst,
            total_amount: booking.total_amount,
            handover_token,
            handover_verified_at: booking.handover_verified_at,
            status: booking.status,
            payment_status: booking.payment_status,
            damage_report: booking.damage_report,
            rental_photos: booking.rental_photos,
            return_confirmed_by_renter: booking.return_confirmed_by_renter,
            return_confirmed_at: booking.return_confirmed_at,
            cancellation_reason: booking.cancellation_reason,
            created_at: booking.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .bookings
        .create(
            &principal,
            CreateBooking {
                equipment_id: req.equipment_id,
                start: req.start,
                end: req.end,
            },
        )
        .await?;

    Ok(Json(BookingResponse::for_viewer(booking, principal.user_id)))
}

/// GET /v1/bookings
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.bookings.list_for_user(&principal).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(|b| BookingResponse::for_viewer(b, principal.user_id))
            .collect(),
    ))
}

/// GET /v1/bookings/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.bookings.get(&principal, booking_id).await?;
    Ok(Json(BookingResponse::for_viewer(booking, principal.user_id)))
}

/// POST /v1/equipment/:id/quote
/// Price preview; identical arithmetic to booking creation.
pub async fn quote(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state
        .bookings
        .quote(equipment_id, req.start, req.end)
        .await?;
    Ok(Json(quote))
}

/// POST /v1/bookings/:id/verify-handover
pub async fn verify_handover(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<VerifyHandoverRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .bookings
        .verify_handover(&principal, booking_id, &req.token)
        .await?;
    Ok(Json(BookingResponse::for_viewer(booking, principal.user_id)))
}

/// POST /v1/bookings/:id/confirm-return
pub async fn confirm_return(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bookings.confirm_return(&principal, booking_id).await?;
    Ok(Json(serde_json::json!({ "status": "RETURN_CONFIRMED" })))
}

/// POST /v1/bookings/:id/damage-report
pub async fn file_damage_report(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<DamageReportRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .bookings
        .file_damage_report(
            &principal,
            booking_id,
            &req.description,
            &req.severity,
            req.photos,
        )
        .await?;
    Ok(Json(serde_json::json!({ "status": "DAMAGE_REPORTED" })))
}

/// POST /v1/bookings/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.bookings.complete(&principal, booking_id).await?;
    Ok(Json(BookingResponse::for_viewer(booking, principal.user_id)))
}

/// POST /v1/bookings/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .bookings
        .cancel(&principal, booking_id, req.reason)
        .await?;
    Ok(Json(BookingResponse::for_viewer(booking, principal.user_id)))
}

/// POST /v1/bookings/:id/photos
pub async fn upload_photos(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UploadPhotosRequest>,
) -> Result<Json<UploadPhotosResponse>, ApiError> {
    let uploaded = state
        .bookings
        .upload_rental_photos(&principal, booking_id, req.photos)
        .await?;
    Ok(Json(UploadPhotosResponse { uploaded }))
}
