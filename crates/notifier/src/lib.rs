//! Push delivery for offline recipients.
//!
//! - [`registry`] resolves device tokens for a set of users
//! - [`message`] shapes title/body/data into the static FCM/APNs envelope
//! - [`fcm`] is the Firebase HTTP v1 transport
//! - [`gateway`] ties them together behind the [`PushChannel`] capability

pub mod error;
pub mod fcm;
pub mod gateway;
pub mod message;
pub mod registry;

pub use error::PushError;
pub use gateway::{MulticastReport, PushChannel, PushGateway, PushOutcome, PushTransport, TokenResult};
pub use message::PushMessage;
pub use registry::{DeviceRegistry, PgDeviceRegistry};
