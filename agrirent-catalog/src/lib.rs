pub mod equipment;
pub mod rating;

pub use equipment::{Equipment, EquipmentRepository, ReserveOutcome};
pub use rating::RatingAggregate;
