use agrirent_core::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rentable catalog item listed by a lender.
///
/// `is_available` doubles as the booking lock: `true` means bookable,
/// `false` means reserved or in use. The booking state machine is the sole
/// writer of this flag on behalf of bookings, and at most one non-terminal
/// booking may hold it `false` at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Hourly rate in whole currency units.
    pub price_per_hour: i64,
    pub is_available: bool,
    /// Mean review rating rounded to 1 decimal; 0.0 until first review.
    pub rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Equipment {
    pub fn new(owner_id: Uuid, name: String, price_per_hour: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            price_per_hour,
            is_available: true,
            rating: 0.0,
            review_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Result of the atomic availability check-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The flag was `true` and this caller flipped it to `false`.
    Reserved,
    /// The flag was already `false`; someone else holds the lock.
    Unavailable,
    NotFound,
}

/// Catalog access as seen by the booking core.
///
/// `reserve` must be a single atomic conditional update at the storage
/// layer (not an application-level read followed by a write): under two
/// concurrent creates exactly one caller observes [`ReserveOutcome::Reserved`].
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn insert(&self, equipment: &Equipment) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Equipment>, StoreError>;

    async fn list_available(&self) -> Result<Vec<Equipment>, StoreError>;

    /// Atomically flip `is_available` from `true` to `false`.
    async fn reserve(&self, id: Uuid) -> Result<ReserveOutcome, StoreError>;

    /// Release the booking lock (`is_available = true`).
    async fn release(&self, id: Uuid) -> Result<(), StoreError>;

    /// Write back the recomputed review aggregate.
    async fn update_rating(&self, id: Uuid, rating: f64, review_count: u32)
        -> Result<(), StoreError>;
}
