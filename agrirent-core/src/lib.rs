pub mod error;
pub mod identity;
pub mod media;
pub mod notify;

pub use error::{BookingError, StoreError};
pub use identity::{KycStatus, Principal, Role};
pub use media::{ImageStore, MockImageStore, UploadError};
pub use notify::{Notification, NotificationKind, Notifier, NotifyError};
