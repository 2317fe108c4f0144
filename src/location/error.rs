//! Error type shared by the ledger, the façade and the Cloud Locate engine

use crate::network::error::Error as MqttError;

/// Code for success in the shared integer taxonomy.
pub const SUCCESS: i32 = 0;

/// Errors reported by location operations.
///
/// Local failures are converted into one of the common variants where they
/// are detected. Failures reported by a positioning backend or by the MQTT
/// session are carried through unchanged in [`Error::Backend`] and
/// [`Error::Mqtt`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The location service has not been initialised.
    NotInitialised,
    /// A required argument is missing or a handle/type combination is invalid.
    InvalidParameter,
    /// A fixed-capacity buffer or ledger queue is full.
    NoMemory,
    /// No backend serves this device/location-type combination.
    NotSupported,
    /// No answer arrived before the deadline.
    Timeout,
    /// An answer arrived but could not be understood.
    Unknown,
    /// The backend is busy with another operation.
    Busy,
    /// Error code reported verbatim by a positioning backend.
    Backend(i32),
    /// Error reported verbatim by the MQTT session.
    Mqtt(MqttError),
}

impl Error {
    /// Negative integer code in the shared error taxonomy.
    ///
    /// ```rust
    /// use ulocate::location::Error;
    ///
    /// assert_eq!(Error::InvalidParameter.code(), -5);
    /// assert_eq!(Error::Backend(-260).code(), -260);
    /// ```
    pub fn code(self) -> i32 {
        match self {
            Error::Unknown => -1,
            Error::NotInitialised => -2,
            Error::NotSupported => -4,
            Error::InvalidParameter => -5,
            Error::NoMemory => -6,
            Error::Timeout => -9,
            Error::Busy => -17,
            Error::Backend(code) => code,
            Error::Mqtt(e) => e.code(),
        }
    }

    /// Inverse of [`code`](Error::code) for the common range.
    ///
    /// Returns `None` for [`SUCCESS`]; codes outside the common range come
    /// back as [`Error::Backend`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            SUCCESS => None,
            -1 => Some(Error::Unknown),
            -2 => Some(Error::NotInitialised),
            -4 => Some(Error::NotSupported),
            -5 => Some(Error::InvalidParameter),
            -6 => Some(Error::NoMemory),
            -9 => Some(Error::Timeout),
            -17 => Some(Error::Busy),
            other => Some(Error::Backend(other)),
        }
    }
}

impl From<MqttError> for Error {
    fn from(e: MqttError) -> Self {
        Error::Mqtt(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotInitialised => write!(f, "location service not initialised"),
            Error::InvalidParameter => write!(f, "invalid parameter"),
            Error::NoMemory => write!(f, "out of memory"),
            Error::NotSupported => write!(f, "not supported"),
            Error::Timeout => write!(f, "timed out"),
            Error::Unknown => write!(f, "unknown error"),
            Error::Busy => write!(f, "busy"),
            Error::Backend(code) => write!(f, "backend error {code}"),
            Error::Mqtt(e) => write!(f, "mqtt: {e}"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotInitialised => defmt::write!(f, "NotInitialised"),
            Error::InvalidParameter => defmt::write!(f, "InvalidParameter"),
            Error::NoMemory => defmt::write!(f, "NoMemory"),
            Error::NotSupported => defmt::write!(f, "NotSupported"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::Unknown => defmt::write!(f, "Unknown"),
            Error::Busy => defmt::write!(f, "Busy"),
            Error::Backend(code) => defmt::write!(f, "Backend({})", code),
            Error::Mqtt(e) => defmt::write!(f, "Mqtt({})", e),
        }
    }
}
