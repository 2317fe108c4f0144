//! Common error types for MQTT session operations

/// Base of the negative code range reserved for MQTT session errors.
pub const MQTT_ERROR_BASE: i32 = -768;

/// A common error type for MQTT session operations.
///
/// This enum defines the failures an MQTT collaborator can report to the
/// location layer. It is designed to be simple and portable for `no_std`
/// environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a session that is not connected.
    NotConnected,
    /// An error occurred while sending a packet.
    WriteError,
    /// An error occurred while reading a packet.
    ReadError,
    /// The broker did not answer in time.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// The broker refused a subscription.
    SubscriptionRefused,
    /// A caller-supplied buffer was too small for the message.
    BufferTooSmall,
    /// A protocol-specific error occurred.
    ProtocolError,
}

impl Error {
    /// Negative integer code for this error, partitioned away from the
    /// common error range.
    pub fn code(self) -> i32 {
        let offset = match self {
            Error::NotConnected => 1,
            Error::WriteError => 2,
            Error::ReadError => 3,
            Error::Timeout => 4,
            Error::ConnectionClosed => 5,
            Error::SubscriptionRefused => 6,
            Error::BufferTooSmall => 7,
            Error::ProtocolError => 8,
        };
        MQTT_ERROR_BASE - offset
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotConnected => write!(f, "MQTT session not connected"),
            Error::WriteError => write!(f, "MQTT write failed"),
            Error::ReadError => write!(f, "MQTT read failed"),
            Error::Timeout => write!(f, "MQTT broker timeout"),
            Error::ConnectionClosed => write!(f, "MQTT connection closed"),
            Error::SubscriptionRefused => write!(f, "MQTT subscription refused"),
            Error::BufferTooSmall => write!(f, "MQTT message buffer too small"),
            Error::ProtocolError => write!(f, "MQTT protocol error"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::SubscriptionRefused => defmt::write!(f, "SubscriptionRefused"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
