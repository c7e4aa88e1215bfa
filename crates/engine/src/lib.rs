//! Notification fanout: persistence, presence, delivery orchestration and the
//! domain producers that feed it.

pub mod chat;
pub mod dedupe;
pub mod fanout;
pub mod favorites;
pub mod memory;
pub mod presence;
pub mod price_change;
pub mod retention;
pub mod service;
pub mod store;

pub use fanout::{DispatchReport, DispatchRequest, FanoutEngine};
pub use presence::{Presence, PresenceSlot};
pub use service::NotificationService;
pub use store::{NotificationStore, PgNotificationStore};
