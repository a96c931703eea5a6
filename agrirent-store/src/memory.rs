//! In-memory repositories backed by mutex-guarded maps.
//!
//! Used by the test suite and by the API binary when no database is
//! configured. Every conditional update holds the map lock across its
//! check-and-set, so the same atomicity guarantees hold as for the
//! Postgres store's conditional UPDATEs.

use std::collections::HashMap;
use std::sync::Mutex;

use agrirent_booking::models::{Booking, BookingStatus, DamageReport, PaymentStatus, RentalPhoto};
use agrirent_booking::repository::{
    BookingRepository, PhotoAppendOutcome, Transition, TransitionOutcome,
};
use agrirent_booking::review::{Review, ReviewRepository};
use agrirent_catalog::{Equipment, EquipmentRepository, ReserveOutcome};
use agrirent_core::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryBookings {
    inner: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookings {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut map = lock(&self.inner);
        // Mirrors the partial unique index on active handover tokens.
        if map
            .values()
            .any(|b| !b.status.is_terminal() && b.handover_token == booking.handover_token)
        {
            return Err(StoreError::Duplicate(
                "active handover token already in use".to_string(),
            ));
        }
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(lock(&self.inner).get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = lock(&self.inner)
            .values()
            .filter(|b| b.is_party(user_id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn active_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.inner)
            .values()
            .any(|b| !b.status.is_terminal() && b.handover_token == token))
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        change: Transition,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut map = lock(&self.inner);
        let Some(booking) = map.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if booking.status != expected {
            return Ok(TransitionOutcome::Conflict {
                current: booking.status,
            });
        }

        match change {
            Transition::Activate { at } => {
                booking.status = BookingStatus::InProgress;
                booking.handover_verified_at = Some(at);
                booking.updated_at = at;
            }
            Transition::Complete { at } => {
                booking.status = BookingStatus::Completed;
                booking.payment_status = PaymentStatus::Paid;
                booking.updated_at = at;
            }
            Transition::Cancel { to, reason, at } => {
                booking.status = to;
                booking.payment_status = PaymentStatus::Refunded;
                booking.cancellation_reason = reason;
                booking.updated_at = at;
            }
        }

        Ok(TransitionOutcome::Applied(booking.clone()))
    }

    async fn set_return_confirmed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut map = lock(&self.inner);
        let Some(booking) = map.get_mut(&id) else {
            return Ok(false);
        };
        if booking.status != BookingStatus::InProgress || booking.return_confirmed_by_renter {
            return Ok(false);
        }
        booking.return_confirmed_by_renter = true;
        booking.return_confirmed_at = Some(at);
        booking.updated_at = at;
        Ok(true)
    }

    async fn set_damage_report(&self, id: Uuid, report: DamageReport) -> Result<bool, StoreError> {
        let mut map = lock(&self.inner);
        let Some(booking) = map.get_mut(&id) else {
            return Ok(false);
        };
        if booking.status != BookingStatus::InProgress || booking.damage_report.is_some() {
            return Ok(false);
        }
        booking.updated_at = report.filed_at;
        booking.damage_report = Some(report);
        Ok(true)
    }

    async fn append_rental_photos(
        &self,
        id: Uuid,
        photos: Vec<RentalPhoto>,
        max_total: usize,
    ) -> Result<PhotoAppendOutcome, StoreError> {
        let mut map = lock(&self.inner);
        let Some(booking) = map.get_mut(&id) else {
            return Ok(PhotoAppendOutcome::NotFound);
        };
        if booking.status != BookingStatus::InProgress {
            return Ok(PhotoAppendOutcome::NotInProgress);
        }
        let existing = booking.rental_photos.len();
        if existing + photos.len() > max_total {
            return Ok(PhotoAppendOutcome::CapExceeded { existing });
        }
        booking.rental_photos.extend(photos);
        booking.updated_at = Utc::now();
        Ok(PhotoAppendOutcome::Appended)
    }
}

#[derive(Default)]
pub struct MemoryEquipment {
    inner: Mutex<HashMap<Uuid, Equipment>>,
}

impl MemoryEquipment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/bootstrap helper: insert without going through the async trait.
    pub fn seed(&self, equipment: Equipment) {
        lock(&self.inner).insert(equipment.id, equipment);
    }
}

#[async_trait]
impl EquipmentRepository for MemoryEquipment {
    async fn insert(&self, equipment: &Equipment) -> Result<(), StoreError> {
        lock(&self.inner).insert(equipment.id, equipment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Equipment>, StoreError> {
        Ok(lock(&self.inner).get(&id).cloned())
    }

    async fn list_available(&self) -> Result<Vec<Equipment>, StoreError> {
        let mut items: Vec<Equipment> = lock(&self.inner)
            .values()
            .filter(|e| e.is_available)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn reserve(&self, id: Uuid) -> Result<ReserveOutcome, StoreError> {
        // Check-and-set under the lock: the in-memory equivalent of the
        // Postgres `UPDATE ... WHERE is_available = TRUE`.
        let mut map = lock(&self.inner);
        let Some(item) = map.get_mut(&id) else {
            return Ok(ReserveOutcome::NotFound);
        };
        if !item.is_available {
            return Ok(ReserveOutcome::Unavailable);
        }
        item.is_available = false;
        Ok(ReserveOutcome::Reserved)
    }

    async fn release(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(item) = lock(&self.inner).get_mut(&id) {
            item.is_available = true;
        }
        Ok(())
    }

    async fn update_rating(
        &self,
        id: Uuid,
        rating: f64,
        review_count: u32,
    ) -> Result<(), StoreError> {
        if let Some(item) = lock(&self.inner).get_mut(&id) {
            item.rating = rating;
            item.review_count = review_count;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryReviews {
    inner: Mutex<Vec<Review>>,
}

impl MemoryReviews {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewRepository for MemoryReviews {
    async fn insert(&self, review: &Review) -> Result<(), StoreError> {
        lock(&self.inner).push(review.clone());
        Ok(())
    }

    async fn exists_for_booking(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        Ok(lock(&self.inner).iter().any(|r| r.booking_id == booking_id))
    }

    async fn ratings_for_equipment(&self, equipment_id: Uuid) -> Result<Vec<u8>, StoreError> {
        Ok(lock(&self.inner)
            .iter()
            .filter(|r| r.equipment_id == equipment_id)
            .map(|r| r.rating)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrirent_booking::pricing::{compute_quote, FeeSchedule};
    use chrono::TimeZone;

    fn sample_booking() -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let quote = compute_quote(start, end, 100, &FeeSchedule::default()).unwrap();
        Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            start,
            end,
            quote,
            "007123".to_string(),
        )
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = MemoryBookings::new();
        let booking = sample_booking();
        repo.insert(&booking).await.unwrap();

        let first = repo
            .transition(
                booking.id,
                BookingStatus::Created,
                Transition::Activate { at: Utc::now() },
            )
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(_)));

        // Second caller expecting CREATED loses.
        let second = repo
            .transition(
                booking.id,
                BookingStatus::Created,
                Transition::Activate { at: Utc::now() },
            )
            .await
            .unwrap();
        match second {
            TransitionOutcome::Conflict { current } => {
                assert_eq!(current, BookingStatus::InProgress)
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let repo = MemoryEquipment::new();
        let item = Equipment::new(Uuid::new_v4(), "Plough".to_string(), 60);
        let id = item.id;
        repo.seed(item);

        assert_eq!(repo.reserve(id).await.unwrap(), ReserveOutcome::Reserved);
        assert_eq!(repo.reserve(id).await.unwrap(), ReserveOutcome::Unavailable);

        repo.release(id).await.unwrap();
        assert_eq!(repo.reserve(id).await.unwrap(), ReserveOutcome::Reserved);

        assert_eq!(
            repo.reserve(Uuid::new_v4()).await.unwrap(),
            ReserveOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_insert_rejects_colliding_active_token() {
        let repo = MemoryBookings::new();
        let first = sample_booking();
        let second = sample_booking();
        assert_eq!(first.handover_token, second.handover_token);

        repo.insert(&first).await.unwrap();
        let err = repo.insert(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // Once the holder is terminal the code may be reissued.
        repo.transition(
            first.id,
            BookingStatus::Created,
            Transition::Cancel {
                to: BookingStatus::CancelledByRenter,
                reason: None,
                at: Utc::now(),
            },
        )
        .await
        .unwrap();
        repo.insert(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_active_token_scan_ignores_terminal() {
        let repo = MemoryBookings::new();
        let booking = sample_booking();
        let token = booking.handover_token.clone();
        repo.insert(&booking).await.unwrap();

        assert!(repo.active_token_exists(&token).await.unwrap());

        repo.transition(
            booking.id,
            BookingStatus::Created,
            Transition::Cancel {
                to: BookingStatus::CancelledByRenter,
                reason: None,
                at: Utc::now(),
            },
        )
        .await
        .unwrap();

        assert!(!repo.active_token_exists(&token).await.unwrap());
    }
}
