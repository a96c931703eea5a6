use uuid::Uuid;

/// Caller-facing failures of the booking lifecycle.
///
/// Every rejected operation names the precondition that failed so clients
/// can react (redirect to the marketplace, show a retry, etc.) instead of
/// getting a generic "booking failed".
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Equipment not found: {0}")]
    EquipmentNotFound(Uuid),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Operation '{action}' is not allowed while the booking is {current}")]
    InvalidState {
        action: &'static str,
        current: String,
    },

    #[error("Your account has not completed KYC verification")]
    NotVerified,

    #[error("Equipment is no longer available for the requested period")]
    EquipmentUnavailable,

    #[error("You cannot book your own equipment")]
    SelfBookingForbidden,

    #[error("Rental end must be after rental start")]
    InvalidInterval,

    #[error("Handover code does not match")]
    InvalidToken,

    #[error("Photo upload failed: {0}")]
    UploadFailed(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backend/datastore faults. These are the only non-recoverable failures;
/// everything in [`BookingError`] above is a structured caller error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Datastore error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A uniqueness guarantee held at the storage layer rejected the
    /// write (e.g. an active handover code already in use).
    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}
