use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use agrirent_catalog::Equipment;
use agrirent_core::{BookingError, Principal};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: String,
    pub price_per_hour: i64,
}

/// POST /v1/equipment
/// List a new item. Only KYC-verified users may list.
pub async fn create_equipment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateEquipmentRequest>,
) -> Result<Json<Equipment>, ApiError> {
    if !principal.is_verified() {
        return Err(BookingError::NotVerified.into());
    }
    if req.name.trim().is_empty() {
        return Err(BookingError::Validation("equipment name is required".to_string()).into());
    }
    if req.price_per_hour <= 0 {
        return Err(
            BookingError::Validation("price per hour must be positive".to_string()).into(),
        );
    }

    let equipment = Equipment::new(principal.user_id, req.name.trim().to_string(), req.price_per_hour);
    state
        .equipment
        .insert(&equipment)
        .await
        .map_err(BookingError::from)?;

    Ok(Json(equipment))
}

/// GET /v1/equipment
/// Marketplace view: items currently bookable.
pub async fn list_equipment(
    State(state): State<AppState>,
) -> Result<Json<Vec<Equipment>>, ApiError> {
    let items = state
        .equipment
        .list_available()
        .await
        .map_err(BookingError::from)?;
    Ok(Json(items))
}

/// GET /v1/equipment/:id
pub async fn get_equipment(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
) -> Result<Json<Equipment>, ApiError> {
    let item = state
        .equipment
        .get(equipment_id)
        .await
        .map_err(BookingError::from)?
        .ok_or(BookingError::EquipmentNotFound(equipment_id))?;
    Ok(Json(item))
}
