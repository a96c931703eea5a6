use agrirent_core::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, DamageReport, RentalPhoto};

/// A guarded lifecycle change, applied only if the stored status still
/// equals the expected status at write time.
#[derive(Debug, Clone)]
pub enum Transition {
    /// `Created -> InProgress`; stamps `handover_verified_at`.
    Activate { at: DateTime<Utc> },
    /// `InProgress -> Completed`; settles payment as `Paid`.
    Complete { at: DateTime<Utc> },
    /// `Created -> CancelledBy*`; settles payment as `Refunded`.
    Cancel {
        to: BookingStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
}

/// Result of a guarded transition. `Conflict` means another caller moved
/// the booking first; the write did not happen.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Booking),
    Conflict { current: BookingStatus },
    NotFound,
}

/// Result of a guarded proof-photo append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoAppendOutcome {
    Appended,
    /// Batch would push the cumulative count over the cap.
    CapExceeded { existing: usize },
    NotInProgress,
    NotFound,
}

/// Durable booking store.
///
/// `transition`, `set_return_confirmed`, `set_damage_report` and
/// `append_rental_photos` are compare-and-set writes: the precondition is
/// re-checked atomically at the storage layer, so concurrent callers for
/// the same booking cannot both win.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Bookings the user participates in, as renter or lender.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// True if any non-terminal booking already carries this handover code.
    async fn active_token_exists(&self, token: &str) -> Result<bool, StoreError>;

    async fn transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        change: Transition,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Set the renter's return confirmation exactly once while in
    /// progress. Returns false if the guard did not hold.
    async fn set_return_confirmed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Attach the damage report while in progress, first filing wins.
    /// Returns false if the guard did not hold.
    async fn set_damage_report(&self, id: Uuid, report: DamageReport) -> Result<bool, StoreError>;

    async fn append_rental_photos(
        &self,
        id: Uuid,
        photos: Vec<RentalPhoto>,
        max_total: usize,
    ) -> Result<PhotoAppendOutcome, StoreError>;
}
