//! MQTT session contract consumed by the Cloud Locate engine.
//!
//! The location layer never speaks the MQTT wire protocol itself. It drives
//! an already connected and authenticated session through [`MqttSession`],
//! which any MQTT client (a cellular module's built-in client, a software
//! client over TCP, ...) can implement.

use super::error::Error;

/// Quality of Service levels for MQTT messages.
///
/// # Examples
///
/// ```rust
/// use ulocate::network::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::from_u8(1), Some(QoS::AtLeastOnce));
/// assert_eq!(QoS::from_u8(3), None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery.
    AtLeastOnce = 1,
    /// **QoS 2**: Exactly once delivery.
    ExactlyOnce = 2,
}

impl QoS {
    /// Convert the on-the-wire value into a [`QoS`].
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Metadata of a message copied out of the session by
/// [`MqttSession::read_message`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ReadMessage {
    /// Number of topic bytes written to the topic buffer.
    pub topic_len: usize,
    /// Number of payload bytes written to the payload buffer.
    pub payload_len: usize,
    /// QoS the message was delivered with.
    pub qos: QoS,
}

/// An open MQTT session.
///
/// Implementations buffer messages that arrive on subscribed topics;
/// [`unread`](MqttSession::unread) reports how many are waiting and
/// [`read_message`](MqttSession::read_message) copies the oldest one out.
pub trait MqttSession {
    /// Subscribe to `topic`, returning the QoS granted by the broker.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<QoS, Error>;

    /// Remove a subscription made with [`subscribe`](MqttSession::subscribe).
    fn unsubscribe(&mut self, topic: &str) -> Result<(), Error>;

    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), Error>;

    /// Number of received messages not yet read.
    fn unread(&self) -> usize;

    /// Copy the oldest unread message into the supplied buffers and remove
    /// it from the session.
    ///
    /// A payload longer than `payload` is truncated to fit; a topic longer
    /// than `topic` fails with [`Error::BufferTooSmall`].
    fn read_message(&mut self, topic: &mut [u8], payload: &mut [u8]) -> Result<ReadMessage, Error>;
}
