use std::sync::Arc;

use agrirent_core::{
    BookingError, ImageStore, Notification, NotificationKind, Notifier, Principal, StoreError,
};
use agrirent_catalog::{EquipmentRepository, ReserveOutcome};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, DamageReport, RentalPhoto};
use crate::pricing::{compute_quote, FeeSchedule, Quote};
use crate::repository::{
    BookingRepository, PhotoAppendOutcome, Transition, TransitionOutcome,
};
use crate::token;

/// Caps on renter proof-of-use photos.
#[derive(Debug, Clone, Copy)]
pub struct PhotoPolicy {
    pub max_per_batch: usize,
    pub max_total: usize,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            max_per_batch: 5,
            max_total: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub equipment_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUpload {
    /// Base64 image payload, handed to the image store.
    pub data: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// The booking lifecycle state machine.
///
/// Every operation follows the same shape: resolve the booking, evaluate
/// the caller's role and the current status, apply one atomic
/// compare-and-set write through the repository, then emit best-effort
/// notifications. Notification failures are logged and never roll a
/// committed transition back.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    equipment: Arc<dyn EquipmentRepository>,
    notifier: Arc<dyn Notifier>,
    images: Arc<dyn ImageStore>,
    fees: FeeSchedule,
    photo_policy: PhotoPolicy,
}

// Bounded retry for the 1-in-900,000-per-pair token collision.
const TOKEN_ATTEMPTS: usize = 10;

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        equipment: Arc<dyn EquipmentRepository>,
        notifier: Arc<dyn Notifier>,
        images: Arc<dyn ImageStore>,
        fees: FeeSchedule,
        photo_policy: PhotoPolicy,
    ) -> Self {
        Self {
            bookings,
            equipment,
            notifier,
            images,
            fees,
            photo_policy,
        }
    }

    /// Client-facing price preview. Same pure function as `create`, so the
    /// estimate and the charge always agree.
    pub async fn quote(
        &self,
        equipment_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Quote, BookingError> {
        let equipment = self
            .equipment
            .get(equipment_id)
            .await?
            .ok_or(BookingError::EquipmentNotFound(equipment_id))?;

        compute_quote(start, end, equipment.price_per_hour, &self.fees)
    }

    /// Create a booking: KYC gate, self-booking check, pricing snapshot,
    /// handover code issue, atomic equipment reserve, persist, notify.
    pub async fn create(
        &self,
        principal: &Principal,
        req: CreateBooking,
    ) -> Result<Booking, BookingError> {
        if !principal.is_verified() {
            return Err(BookingError::NotVerified);
        }

        let equipment = self
            .equipment
            .get(req.equipment_id)
            .await?
            .ok_or(BookingError::EquipmentNotFound(req.equipment_id))?;

        if equipment.owner_id == principal.user_id {
            return Err(BookingError::SelfBookingForbidden);
        }

        let quote = compute_quote(req.start, req.end, equipment.price_per_hour, &self.fees)?;
        let handover_token = self.allocate_token().await?;

        // The reserve is the single atomic check-and-set on the
        // availability flag: under two concurrent creates, exactly one
        // caller gets Reserved here.
        match self.equipment.reserve(req.equipment_id).await? {
            ReserveOutcome::Reserved => {}
            ReserveOutcome::Unavailable => return Err(BookingError::EquipmentUnavailable),
            ReserveOutcome::NotFound => {
                return Err(BookingError::EquipmentNotFound(req.equipment_id))
            }
        }

        let mut booking = Booking::new(
            req.equipment_id,
            principal.user_id,
            equipment.owner_id,
            req.start,
            req.end,
            quote,
            handover_token,
        );

        let mut attempt = 1;
        let insert_failed: Option<BookingError> = loop {
            match self.bookings.insert(&booking).await {
                Ok(()) => break None,
                // The store enforces active-token uniqueness; a collision
                // that slipped past the pre-check gets a fresh code.
                Err(StoreError::Duplicate(_)) if attempt < TOKEN_ATTEMPTS => {
                    attempt += 1;
                    match self.allocate_token().await {
                        Ok(code) => booking.handover_token = code,
                        Err(err) => break Some(err),
                    }
                }
                Err(err) => break Some(err.into()),
            }
        };
        if let Some(err) = insert_failed {
            // Compensate: don't leave the equipment locked by a booking
            // that was never written.
            if let Err(release_err) = self.equipment.release(req.equipment_id).await {
                tracing::error!(
                    equipment_id = %req.equipment_id,
                    error = %release_err,
                    "Failed to release equipment after aborted booking insert"
                );
            }
            return Err(err);
        }

        self.emit(Notification {
            recipient_id: booking.owner_id,
            sender_id: Some(booking.renter_id),
            kind: NotificationKind::BookingCreated,
            message: format!(
                "Your {} was booked for {} hour(s), total ₹{}",
                equipment.name, booking.hours, booking.total_amount
            ),
            link: format!("/bookings/{}", booking.id),
        })
        .await;

        Ok(booking)
    }

    /// Lender enters the renter's 6-digit code at physical pickup.
    /// `Created -> InProgress`, first caller wins.
    pub async fn verify_handover(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        entered_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.require(booking_id).await?;

        if booking.owner_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the equipment owner can verify handover".to_string(),
            ));
        }
        if booking.status != BookingStatus::Created {
            return Err(invalid_state("verify_handover", booking.status));
        }
        if !token::token_matches(&booking.handover_token, entered_token) {
            return Err(BookingError::InvalidToken);
        }

        let updated = self
            .apply(
                booking_id,
                BookingStatus::Created,
                Transition::Activate { at: Utc::now() },
                "verify_handover",
            )
            .await?;

        self.emit(Notification {
            recipient_id: updated.renter_id,
            sender_id: Some(updated.owner_id),
            kind: NotificationKind::HandoverVerified,
            message: "Handover verified, your rental is now active".to_string(),
            link: format!("/bookings/{}", updated.id),
        })
        .await;

        Ok(updated)
    }

    /// Renter signals the physical return. Sets the flag once; completion
    /// stays a distinct, lender-driven action.
    pub async fn confirm_return(
        &self,
        principal: &Principal,
        booking_id: Uuid,
    ) -> Result<(), BookingError> {
        let booking = self.require(booking_id).await?;

        if booking.renter_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the renter can confirm the return".to_string(),
            ));
        }
        if booking.status != BookingStatus::InProgress {
            return Err(invalid_state("confirm_return", booking.status));
        }
        if booking.return_confirmed_by_renter {
            return Err(BookingError::Validation(
                "return has already been confirmed".to_string(),
            ));
        }

        if !self
            .bookings
            .set_return_confirmed(booking_id, Utc::now())
            .await?
        {
            return Err(BookingError::Validation(
                "return has already been confirmed".to_string(),
            ));
        }

        self.emit(Notification {
            recipient_id: booking.owner_id,
            sender_id: Some(booking.renter_id),
            kind: NotificationKind::ReturnConfirmed,
            message: "The renter confirmed the equipment was returned".to_string(),
            link: format!("/bookings/{}", booking.id),
        })
        .await;

        Ok(())
    }

    /// Lender files a damage claim during the rental. The photos hit the
    /// image store first; the booking is only touched once all uploads
    /// succeeded. Lifecycle state is unchanged.
    pub async fn file_damage_report(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        description: &str,
        severity: &str,
        photos: Vec<String>,
    ) -> Result<(), BookingError> {
        let booking = self.require(booking_id).await?;

        if booking.owner_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the equipment owner can file a damage report".to_string(),
            ));
        }
        if booking.status != BookingStatus::InProgress {
            return Err(invalid_state("file_damage_report", booking.status));
        }
        if description.trim().is_empty() {
            return Err(BookingError::Validation(
                "damage description is required".to_string(),
            ));
        }
        if severity.trim().is_empty() {
            return Err(BookingError::Validation(
                "damage severity is required".to_string(),
            ));
        }
        if booking.damage_report.is_some() {
            return Err(BookingError::Validation(
                "a damage report has already been filed".to_string(),
            ));
        }

        let mut photo_urls = Vec::with_capacity(photos.len());
        for photo in &photos {
            let url = self
                .images
                .upload(photo)
                .await
                .map_err(|e| BookingError::UploadFailed(e.to_string()))?;
            photo_urls.push(url);
        }

        let report = DamageReport {
            description: description.trim().to_string(),
            severity: severity.trim().to_string(),
            photo_urls,
            filed_at: Utc::now(),
        };

        if !self.bookings.set_damage_report(booking_id, report).await? {
            return Err(BookingError::Validation(
                "a damage report has already been filed".to_string(),
            ));
        }

        self.emit(Notification {
            recipient_id: booking.renter_id,
            sender_id: Some(booking.owner_id),
            kind: NotificationKind::DamageReported,
            message: format!("The owner reported {} damage on your rental", severity.trim()),
            link: format!("/bookings/{}", booking.id),
        })
        .await;

        Ok(())
    }

    /// Lender closes the rental. `InProgress -> Completed`, payment is
    /// settled as Paid and the equipment lock is released.
    pub async fn complete(
        &self,
        principal: &Principal,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let booking = self.require(booking_id).await?;

        if booking.owner_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the equipment owner can complete the rental".to_string(),
            ));
        }
        if booking.status != BookingStatus::InProgress {
            return Err(invalid_state("complete", booking.status));
        }

        let updated = self
            .apply(
                booking_id,
                BookingStatus::InProgress,
                Transition::Complete { at: Utc::now() },
                "complete",
            )
            .await?;

        self.release_lock(&updated).await;

        self.emit(Notification {
            recipient_id: updated.renter_id,
            sender_id: Some(updated.owner_id),
            kind: NotificationKind::ReviewRequested,
            message: "Your rental is complete, please leave a review".to_string(),
            link: format!("/bookings/{}/review", updated.id),
        })
        .await;
        self.emit(Notification {
            recipient_id: updated.owner_id,
            sender_id: None,
            kind: NotificationKind::BookingCompleted,
            message: format!("Rental settled, ₹{} collected", updated.total_amount),
            link: format!("/bookings/{}", updated.id),
        })
        .await;

        Ok(updated)
    }

    /// Either party backs out before handover. No cancellation once the
    /// equipment has changed hands.
    pub async fn cancel(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let booking = self.require(booking_id).await?;

        if !booking.is_party(principal.user_id) {
            return Err(BookingError::Forbidden(
                "only the renter or the owner can cancel this booking".to_string(),
            ));
        }
        if booking.status != BookingStatus::Created {
            return Err(invalid_state("cancel", booking.status));
        }

        let to = if principal.user_id == booking.renter_id {
            BookingStatus::CancelledByRenter
        } else {
            BookingStatus::CancelledByLender
        };

        let updated = self
            .apply(
                booking_id,
                BookingStatus::Created,
                Transition::Cancel {
                    to,
                    reason: reason.clone(),
                    at: Utc::now(),
                },
                "cancel",
            )
            .await?;

        self.release_lock(&updated).await;

        let other_party = if principal.user_id == updated.renter_id {
            updated.owner_id
        } else {
            updated.renter_id
        };
        self.emit(Notification {
            recipient_id: other_party,
            sender_id: Some(principal.user_id),
            kind: NotificationKind::BookingCancelled,
            message: match &reason {
                Some(r) => format!("Booking cancelled: {}", r),
                None => "Booking cancelled".to_string(),
            },
            link: format!("/bookings/{}", updated.id),
        })
        .await;

        Ok(updated)
    }

    /// Renter uploads proof-of-use photos during the rental. At most 5 per
    /// call, 20 per booking; each photo is stored externally first and
    /// appended with its geo/timestamp metadata.
    pub async fn upload_rental_photos(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        photos: Vec<PhotoUpload>,
    ) -> Result<usize, BookingError> {
        let booking = self.require(booking_id).await?;

        if booking.renter_id != principal.user_id {
            return Err(BookingError::Forbidden(
                "only the renter can upload rental photos".to_string(),
            ));
        }
        if booking.status != BookingStatus::InProgress {
            return Err(invalid_state("upload_rental_photos", booking.status));
        }
        if photos.is_empty() {
            return Err(BookingError::Validation(
                "at least one photo is required".to_string(),
            ));
        }
        if photos.len() > self.photo_policy.max_per_batch {
            return Err(BookingError::Validation(format!(
                "at most {} photos per upload",
                self.photo_policy.max_per_batch
            )));
        }

        let now = Utc::now();
        let mut stored = Vec::with_capacity(photos.len());
        for photo in &photos {
            let url = self
                .images
                .upload(&photo.data)
                .await
                .map_err(|e| BookingError::UploadFailed(e.to_string()))?;
            stored.push(RentalPhoto {
                url,
                latitude: photo.latitude,
                longitude: photo.longitude,
                taken_at: now,
            });
        }

        let count = stored.len();
        match self
            .bookings
            .append_rental_photos(booking_id, stored, self.photo_policy.max_total)
            .await?
        {
            PhotoAppendOutcome::Appended => Ok(count),
            PhotoAppendOutcome::CapExceeded { existing } => {
                Err(BookingError::Validation(format!(
                    "photo limit is {} per booking ({} already uploaded)",
                    self.photo_policy.max_total, existing
                )))
            }
            PhotoAppendOutcome::NotInProgress => {
                let current = self.require(booking_id).await?;
                Err(invalid_state("upload_rental_photos", current.status))
            }
            PhotoAppendOutcome::NotFound => Err(BookingError::BookingNotFound(booking_id)),
        }
    }

    /// Fetch a booking visible to the caller (a party, or an admin).
    pub async fn get(
        &self,
        principal: &Principal,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let booking = self.require(booking_id).await?;
        if !booking.is_party(principal.user_id) && !principal.is_admin() {
            return Err(BookingError::Forbidden(
                "this booking does not involve you".to_string(),
            ));
        }
        Ok(booking)
    }

    pub async fn list_for_user(&self, principal: &Principal) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_for_user(principal.user_id).await?)
    }

    async fn require(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn apply(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        change: Transition,
        action: &'static str,
    ) -> Result<Booking, BookingError> {
        match self.bookings.transition(booking_id, expected, change).await? {
            TransitionOutcome::Applied(booking) => Ok(booking),
            TransitionOutcome::Conflict { current } => Err(invalid_state(action, current)),
            TransitionOutcome::NotFound => Err(BookingError::BookingNotFound(booking_id)),
        }
    }

    async fn allocate_token(&self) -> Result<String, BookingError> {
        for _ in 0..TOKEN_ATTEMPTS {
            let candidate = token::generate_token();
            if !self.bookings.active_token_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(StoreError::Backend("could not allocate a unique handover code".to_string()).into())
    }

    /// The transition has already committed when this runs, so a failed
    /// release must not surface as a failed operation. The lock leak is
    /// logged for operators instead.
    async fn release_lock(&self, booking: &Booking) {
        if let Err(err) = self.equipment.release(booking.equipment_id).await {
            tracing::error!(
                booking_id = %booking.id,
                equipment_id = %booking.equipment_id,
                error = %err,
                "Failed to release equipment lock after settled booking"
            );
        }
    }

    async fn emit(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(error = %err, "Notification delivery failed");
        }
    }
}

fn invalid_state(action: &'static str, current: BookingStatus) -> BookingError {
    BookingError::InvalidState {
        action,
        current: current.to_string(),
    }
}
