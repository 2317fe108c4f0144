//! Location arbitration across GNSS, Cell Locate, Wi-Fi and Cloud Locate.
//!
//! [`LocationService`] is the entry point. It translates a
//! `(device, location type)` pair into a call on the right positioning
//! backend and offers three execution modes:
//!
//! * blocking: [`LocationService::get`]
//! * one-shot asynchronous: [`LocationService::get_start`]
//! * continuous asynchronous: [`LocationService::get_continuous_start`]
//!
//! Asynchronous requests are recorded in a per-backend [`Ledger`] until the
//! backend reports completion through [`LocationService::complete`].
//!
//! ```text
//!  application ──▶ LocationService ──▶ backend start
//!       ▲                 │ push            │
//!       │ callback        ▼                 ▼ (later, any context)
//!       └──────────── ledger pop ◀── LocationService::complete
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod cloud_locate;
pub mod error;
pub mod ledger;
pub mod service;

pub use backend::{
    Backends, BackendEvent, CellLocateBackend, GnssBackend, KeepGoing, RawFix, RrlpThresholds,
    Unsupported, WifiBackend,
};
pub use error::Error;
pub use ledger::{Ledger, LedgerKind, LocationRequest, RequestState};
pub use service::LocationService;

/// Value of a numeric [`Location`] field that could not be determined.
pub const LOCATION_UNKNOWN: i32 = i32::MIN;

/// Longest API key a Wi-Fi location request can carry.
pub const API_KEY_MAX_LEN: usize = 128;

/// Application callback for asynchronous requests.
///
/// Receives the device, the outcome of the request and, where the backend
/// produced one, the location. A GNSS failure still carries a location
/// (filled with unknown values, possibly with a valid time); a Cell Locate
/// failure carries none.
pub type LocationCallback = fn(DeviceHandle, Result<(), Error>, Option<&Location>);

/// The kind of module behind a [`DeviceHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// A cellular module, which may also tunnel a GNSS receiver.
    Cellular,
    /// A stand-alone GNSS receiver.
    Gnss,
    /// A Wi-Fi/BLE short-range module.
    ShortRange,
    /// A short-range module running the application itself.
    ShortRangeOpenCpu,
}

/// A handle to an opened device.
///
/// Handles are small and `Copy`; two handles refer to the same device when
/// they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Identifier assigned by the device layer.
    pub id: u8,
    /// Type of the module behind this handle.
    pub device_type: DeviceType,
}

impl DeviceHandle {
    /// Create a handle.
    pub const fn new(id: u8, device_type: DeviceType) -> Self {
        Self { id, device_type }
    }
}

/// The technology used to establish a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    /// No location type.
    None,
    /// A GNSS receiver, stand-alone or inside a cellular module.
    Gnss,
    /// The u-blox Cell Locate service, via a cellular module.
    CloudCellLocate,
    /// Google geolocation from Wi-Fi access points.
    CloudGoogle,
    /// Skyhook geolocation from Wi-Fi access points.
    CloudSkyhook,
    /// Here geolocation from Wi-Fi access points.
    CloudHere,
    /// The u-blox Cloud Locate service fed with raw GNSS measurements.
    CloudCloudLocate,
}

impl LocationType {
    /// Short human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::None => "none",
            LocationType::Gnss => "GNSS",
            LocationType::CloudCellLocate => "Cell Locate",
            LocationType::CloudGoogle => "Google",
            LocationType::CloudSkyhook => "Skyhook",
            LocationType::CloudHere => "Here",
            LocationType::CloudCloudLocate => "Cloud Locate",
        }
    }

    /// True for the cloud services reached through Wi-Fi access points.
    pub fn is_wifi(self) -> bool {
        matches!(
            self,
            LocationType::CloudGoogle | LocationType::CloudSkyhook | LocationType::CloudHere
        )
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LocationType {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// A position fix.
///
/// Latitude and longitude are degrees multiplied by ten million; distances
/// are millimetres. Fields that could not be determined hold
/// [`LOCATION_UNKNOWN`] (latitude, longitude, altitude, speed) or `-1`
/// (radius, satellites, time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// How the fix was established.
    pub location_type: LocationType,
    /// Latitude in degrees × 10⁷.
    pub latitude_x1e7: i32,
    /// Longitude in degrees × 10⁷.
    pub longitude_x1e7: i32,
    /// Altitude in millimetres.
    pub altitude_millimetres: i32,
    /// Radius of the accuracy circle in millimetres.
    pub radius_millimetres: i32,
    /// Ground speed in millimetres per second.
    pub speed_millimetres_per_second: i32,
    /// Number of satellites used.
    pub satellites: i32,
    /// UTC time of the fix in seconds since the Unix epoch.
    pub time_utc: i64,
}

impl Location {
    /// A record with every field set to its unknown value.
    pub const fn unknown(location_type: LocationType) -> Self {
        Self {
            location_type,
            latitude_x1e7: LOCATION_UNKNOWN,
            longitude_x1e7: LOCATION_UNKNOWN,
            altitude_millimetres: LOCATION_UNKNOWN,
            radius_millimetres: -1,
            speed_millimetres_per_second: LOCATION_UNKNOWN,
            satellites: -1,
            time_utc: -1,
        }
    }

    /// Stamp a backend fix with the technology that produced it.
    pub fn from_fix(location_type: LocationType, fix: &RawFix) -> Self {
        Self {
            location_type,
            latitude_x1e7: fix.latitude_x1e7,
            longitude_x1e7: fix.longitude_x1e7,
            altitude_millimetres: fix.altitude_millimetres,
            radius_millimetres: fix.radius_millimetres,
            speed_millimetres_per_second: fix.speed_millimetres_per_second,
            satellites: fix.satellites,
            time_utc: fix.time_utc,
        }
    }

    /// True when both latitude and longitude are known.
    pub fn has_position(&self) -> bool {
        self.latitude_x1e7 != LOCATION_UNKNOWN && self.longitude_x1e7 != LOCATION_UNKNOWN
    }

    /// Write the record as JSON into `buf`, returning the length written.
    ///
    /// Fails with [`Error::NoMemory`] if `buf` is too small.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, Error> {
        serde_json_core::to_slice(self, buf).map_err(|_| Error::NoMemory)
    }

    /// Read a record written by [`to_json`](Location::to_json).
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        serde_json_core::from_slice(json)
            .map(|(location, _)| location)
            .map_err(|_| Error::InvalidParameter)
    }
}

/// Progress of a Cell Locate request as reported by the cellular module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    /// Nothing is known, or the backend has no status primitive.
    Unknown,
    /// Measurements are being sent to the server.
    SendingDataToServer,
    /// Waiting for the server to answer.
    WaitingForServerResponse,
    /// The server has answered.
    ReceivedServerResponse,
    /// The module is computing the fix.
    Calculating,
    /// The module gave up; carries its own error code.
    FatalError(i32),
}

impl LocationStatus {
    /// True once the request can no longer succeed.
    pub fn is_fatal(self) -> bool {
        matches!(self, LocationStatus::FatalError(_))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LocationStatus {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LocationStatus::Unknown => defmt::write!(f, "Unknown"),
            LocationStatus::SendingDataToServer => defmt::write!(f, "SendingDataToServer"),
            LocationStatus::WaitingForServerResponse => {
                defmt::write!(f, "WaitingForServerResponse")
            }
            LocationStatus::ReceivedServerResponse => defmt::write!(f, "ReceivedServerResponse"),
            LocationStatus::Calculating => defmt::write!(f, "Calculating"),
            LocationStatus::FatalError(code) => defmt::write!(f, "FatalError({})", code),
        }
    }
}

/// Wi-Fi positioning settings, owned by a ledger entry for the lifetime
/// of the request so the backend can be re-armed without the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiSettings {
    /// Cloud service to ask.
    pub location_type: LocationType,
    /// API key for that service.
    pub api_key: heapless::String<API_KEY_MAX_LEN>,
    /// Minimum number of access points to report, `-1` for the module default.
    pub access_points_filter: i32,
    /// Weakest RSSI (dBm) an access point may have to be reported, `0` for
    /// the module default.
    pub rssi_dbm_filter: i32,
}

impl WifiSettings {
    /// Build settings from the caller's assistance data.
    ///
    /// Fails with [`Error::InvalidParameter`] if `location_type` is not a
    /// Wi-Fi service or the API key is missing, empty or too long.
    pub fn from_assist(location_type: LocationType, assist: &LocationAssist<'_>) -> Result<Self, Error> {
        if !location_type.is_wifi() {
            return Err(Error::InvalidParameter);
        }
        let key = assist.api_key.filter(|k| !k.is_empty()).ok_or(Error::InvalidParameter)?;
        let mut api_key = heapless::String::new();
        api_key.push_str(key).map_err(|_| Error::InvalidParameter)?;
        Ok(Self {
            location_type,
            api_key,
            access_points_filter: assist.access_points_filter,
            rssi_dbm_filter: assist.rssi_dbm_filter,
        })
    }
}

/// Optional assistance data for a location request.
///
/// Which fields matter depends on the location type: the Cell Locate
/// settings for [`LocationType::CloudCellLocate`], the API key and filters
/// for the Wi-Fi services, the thresholds, client ID and MQTT session for
/// [`LocationType::CloudCloudLocate`].
pub struct LocationAssist<'a> {
    /// Desired Cell Locate accuracy, `-1` for the module default.
    pub desired_accuracy_millimetres: i32,
    /// Desired Cell Locate fix timeout, `-1` for the module default.
    pub desired_timeout_seconds: i32,
    /// Stop Cell Locate from using a GNSS receiver attached to the module.
    pub disable_gnss: bool,
    /// Cloud Locate: minimum number of satellites meeting the other
    /// thresholds, `-1` for don't care.
    pub svs_threshold: i32,
    /// Cloud Locate: minimum carrier-to-noise ratio, `-1` for don't care.
    pub c_no_threshold: i32,
    /// Cloud Locate: maximum multipath index, `-1` for don't care.
    pub multipath_index_limit: i32,
    /// Cloud Locate: maximum pseudorange RMS error index, `-1` for don't care.
    pub pseudorange_rms_error_index_limit: i32,
    /// Cloud Locate: MQTT client ID, needed to receive the fix locally.
    pub client_id: Option<&'a str>,
    /// Cloud Locate: publish the measurements and leave the fix with the
    /// cloud service instead of waiting for it.
    pub publish_only: bool,
    /// Cloud Locate: an open, authenticated MQTT session.
    pub mqtt: Option<&'a mut dyn crate::network::mqtt::MqttSession>,
    /// Wi-Fi services: API key.
    pub api_key: Option<&'a str>,
    /// Wi-Fi services: minimum number of access points, `-1` for default.
    pub access_points_filter: i32,
    /// Wi-Fi services: weakest RSSI in dBm, `0` for default.
    pub rssi_dbm_filter: i32,
}

impl LocationAssist<'_> {
    /// The Cloud Locate quality thresholds carried by this assist.
    pub fn rrlp_thresholds(&self) -> RrlpThresholds {
        RrlpThresholds {
            svs: self.svs_threshold,
            c_no: self.c_no_threshold,
            multipath_index: self.multipath_index_limit,
            pseudorange_rms_error_index: self.pseudorange_rms_error_index_limit,
        }
    }
}

impl Default for LocationAssist<'_> {
    fn default() -> Self {
        Self {
            desired_accuracy_millimetres: -1,
            desired_timeout_seconds: -1,
            disable_gnss: false,
            svs_threshold: -1,
            c_no_threshold: -1,
            multipath_index_limit: -1,
            pseudorange_rms_error_index_limit: -1,
            client_id: None,
            publish_only: false,
            mqtt: None,
            api_key: None,
            access_points_filter: -1,
            rssi_dbm_filter: 0,
        }
    }
}

impl fmt::Debug for LocationAssist<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationAssist")
            .field("desired_accuracy_millimetres", &self.desired_accuracy_millimetres)
            .field("desired_timeout_seconds", &self.desired_timeout_seconds)
            .field("disable_gnss", &self.disable_gnss)
            .field("rrlp_thresholds", &self.rrlp_thresholds())
            .field("client_id", &self.client_id)
            .field("publish_only", &self.publish_only)
            .field("mqtt", &self.mqtt.is_some())
            .field("api_key", &self.api_key.map(|_| "<set>"))
            .field("access_points_filter", &self.access_points_filter)
            .field("rssi_dbm_filter", &self.rssi_dbm_filter)
            .finish()
    }
}
