//! Network collaborator contracts.
//!
//! The location layer only needs a publish/subscribe session to reach the
//! Cloud Locate service. This module defines that contract and its error
//! type; transports and MQTT clients live outside this crate.

#![deny(unsafe_code)]

/// Common error types for MQTT session operations
pub mod error;

/// The MQTT session trait and its supporting types
pub mod mqtt;

/// Re-exports of common traits
pub mod prelude {
    pub use super::mqtt::{MqttSession, QoS, ReadMessage};
}
