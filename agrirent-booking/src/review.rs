use std::sync::Arc;

use agrirent_core::{BookingError, Principal, StoreError};
use agrirent_catalog::{EquipmentRepository, RatingAggregate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::BookingStatus;
use crate::repository::BookingRepository;

/// One review per completed booking, left by the renter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, review: &Review) -> Result<(), StoreError>;

    async fn exists_for_booking(&self, booking_id: Uuid) -> Result<bool, StoreError>;

    async fn ratings_for_equipment(&self, equipment_id: Uuid) -> Result<Vec<u8>, StoreError>;
}

/// Review gate over the booking state: only the renter of a completed
/// booking may review, once. Each accepted review recomputes the
/// equipment's aggregate rating.
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    bookings: Arc<dyn BookingRepository>,
    equipment: Arc<dyn EquipmentRepository>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        bookings: Arc<dyn BookingRepository>,
        equipment: Arc<dyn EquipmentRepository>,
    ) -> Self {
        Self {
            reviews,
            bookings,
            equipment,
        }
    }

    pub async fn submit(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Review, BookingError> {
        if !(1..=5).contains(&rating) {
            return Err(BookingError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        if booking.renter_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the renter can review this booking".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(BookingError::InvalidState {
                action: "submit_review",
                current: booking.status.to_string(),
            });
        }
        if self.reviews.exists_for_booking(booking_id).await? {
            return Err(BookingError::Validation(
                "this booking has already been reviewed".to_string(),
            ));
        }

        let review = Review {
            id: Uuid::new_v4(),
            booking_id,
            equipment_id: booking.equipment_id,
            renter_id: booking.renter_id,
            rating,
            comment,
            created_at: Utc::now(),
        };
        self.reviews.insert(&review).await?;

        let ratings = self
            .reviews
            .ratings_for_equipment(booking.equipment_id)
            .await?;
        let aggregate = RatingAggregate::from_ratings(&ratings);
        self.equipment
            .update_rating(booking.equipment_id, aggregate.rating, aggregate.review_count)
            .await?;

        Ok(review)
    }
}
