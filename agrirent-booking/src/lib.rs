pub mod lifecycle;
pub mod models;
pub mod pricing;
pub mod repository;
pub mod review;
pub mod token;

pub use lifecycle::{BookingService, CreateBooking, PhotoPolicy, PhotoUpload};
pub use models::{Booking, BookingStatus, DamageReport, PaymentStatus, RentalPhoto};
pub use pricing::{compute_quote, FeeSchedule, Quote};
pub use repository::{BookingRepository, PhotoAppendOutcome, Transition, TransitionOutcome};
pub use review::{Review, ReviewRepository, ReviewService};
