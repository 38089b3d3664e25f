//! Device-facing message hub: one bus connection whose messages are routed
//! by topic to the provisioning and telemetry services.

pub mod connection;
pub mod error;
pub mod hub;
pub mod router;
pub mod topics;

pub use connection::{BusConnection, BusEvent, MqttConnection, MqttSettings};
pub use error::HubError;
pub use hub::{DEFAULT_RECONNECT_ATTEMPTS, Hub};
pub use router::MessageRouter;
pub use topics::{BREADCRUMB_TOPIC, PROVISION_TOPIC, TopicHandler};
