pub mod app_config;
pub mod memory;
pub mod notifier;
pub mod postgres;

pub use app_config::{BusinessRules, Config};
pub use memory::{MemoryBookings, MemoryEquipment, MemoryReviews};
pub use notifier::ChannelNotifier;
pub use postgres::{PgBookings, PgClient, PgEquipment, PgReviews};
