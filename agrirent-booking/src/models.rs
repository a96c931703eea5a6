use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Quote;

/// Canonical booking lifecycle.
///
/// `Created` means the handover code has been issued and the equipment is
/// locked, awaiting physical pickup. Handover verification moves the
/// booking to `InProgress`; the lender's completion or either party's
/// pre-handover cancellation are the only exits. Terminal bookings are
/// never deleted; they are the audit and billing record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Created,
    InProgress,
    Completed,
    CancelledByRenter,
    CancelledByLender,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::CancelledByRenter
                | BookingStatus::CancelledByLender
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Created => "CREATED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CancelledByRenter => "CANCELLED_BY_RENTER",
            BookingStatus::CancelledByLender => "CANCELLED_BY_LENDER",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status, tracked separately from the lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Damage claim filed by the lender while the rental is in progress.
/// A dispute artifact, not a lifecycle state: it survives completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageReport {
    pub description: String,
    pub severity: String,
    pub photo_urls: Vec<String>,
    pub filed_at: DateTime<Utc>,
}

/// Proof-of-use photo taken by the renter during the rental.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalPhoto {
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub taken_at: DateTime<Utc>,
}

/// The rental agreement ledger entry: one renter, one lender, one
/// equipment unit. Jointly referenced by both parties but owned by the
/// platform; mutated only through the lifecycle operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Clock times for display on bills and listings.
    pub display_start: NaiveTime,
    pub display_end: NaiveTime,

    // Financial snapshot, computed once at creation and immutable after.
    // The hourly rate is copied from the catalog, not live-linked.
    pub hours: i64,
    pub price_per_hour: i64,
    pub subtotal: i64,
    pub platform_fee: i64,
    pub gst: i64,
    pub total_amount: i64,

    /// Single-use 6-digit pickup code, exact string match.
    pub handover_token: String,
    pub handover_verified_at: Option<DateTime<Utc>>,

    pub status: BookingStatus,
    pub payment_status: PaymentStatus,

    pub damage_report: Option<DamageReport>,
    pub rental_photos: Vec<RentalPhoto>,

    pub return_confirmed_by_renter: bool,
    pub return_confirmed_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        equipment_id: Uuid,
        renter_id: Uuid,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        quote: Quote,
        handover_token: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            equipment_id,
            renter_id,
            owner_id,
            start,
            end,
            display_start: start.time(),
            display_end: end.time(),
            hours: quote.hours,
            price_per_hour: quote.price_per_hour,
            subtotal: quote.subtotal,
            platform_fee: quote.platform_fee,
            gst: quote.gst,
            total_amount: quote.total,
            handover_token,
            handover_verified_at: None,
            status: BookingStatus::Created,
            payment_status: PaymentStatus::Pending,
            damage_report: None,
            rental_photos: Vec::new(),
            return_confirmed_by_renter: false,
            return_confirmed_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.renter_id == user_id || self.owner_id == user_id
    }
}
