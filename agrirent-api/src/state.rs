use std::sync::Arc;

use agrirent_booking::{BookingService, ReviewService};
use agrirent_catalog::EquipmentRepository;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub reviews: Arc<ReviewService>,
    pub equipment: Arc<dyn EquipmentRepository>,
    pub auth: AuthConfig,
}
