//! Contracts between the location layer and the positioning backends.
//!
//! A backend is a driver for one positioning technology. The location layer
//! treats each as an opaque service: it calls `start`/`get`/`stop` and
//! expects asynchronous results to come back as a [`BackendEvent`] handed to
//! [`LocationService::complete`](super::LocationService::complete).
//!
//! Backends must report completions from their own context (a driver task,
//! a URC handler), never from inside the `start` call that triggered them.

use embedded_hal::delay::DelayNs;

use super::error::Error;
use super::{DeviceHandle, Location, LocationStatus, WifiSettings, LOCATION_UNKNOWN};

/// Predicate polled during long operations; returning `false` abandons the
/// operation. Receives the handle of the device doing the work.
pub type KeepGoing<'a> = &'a mut dyn FnMut(DeviceHandle) -> bool;

/// Lend an optional predicate to a callee without giving it up.
pub(crate) fn reborrow<'a>(keep_going: &'a mut Option<KeepGoing<'_>>) -> Option<KeepGoing<'a>> {
    match keep_going {
        Some(f) => {
            let f: KeepGoing<'a> = &mut **f;
            Some(f)
        }
        None => None,
    }
}

/// The fields a GNSS or Cell Locate backend reports with a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFix {
    /// Latitude in degrees × 10⁷.
    pub latitude_x1e7: i32,
    /// Longitude in degrees × 10⁷.
    pub longitude_x1e7: i32,
    /// Altitude in millimetres.
    pub altitude_millimetres: i32,
    /// Accuracy radius in millimetres.
    pub radius_millimetres: i32,
    /// Ground speed in millimetres per second.
    pub speed_millimetres_per_second: i32,
    /// Satellites used.
    pub satellites: i32,
    /// UTC seconds since the Unix epoch, `-1` if unknown.
    pub time_utc: i64,
}

impl RawFix {
    /// A fix with every field unknown.
    pub const UNKNOWN: Self = Self {
        latitude_x1e7: LOCATION_UNKNOWN,
        longitude_x1e7: LOCATION_UNKNOWN,
        altitude_millimetres: LOCATION_UNKNOWN,
        radius_millimetres: -1,
        speed_millimetres_per_second: LOCATION_UNKNOWN,
        satellites: -1,
        time_utc: -1,
    };
}

impl Default for RawFix {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Quality gates a GNSS receiver applies before releasing raw measurements.
/// Any field may be `-1` for "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrlpThresholds {
    /// Minimum number of satellites that meet the other thresholds.
    pub svs: i32,
    /// Minimum carrier-to-noise ratio.
    pub c_no: i32,
    /// Maximum multipath index.
    pub multipath_index: i32,
    /// Maximum pseudorange RMS error index.
    pub pseudorange_rms_error_index: i32,
}

impl RrlpThresholds {
    /// No quality gates.
    pub const DONT_CARE: Self = Self {
        svs: -1,
        c_no: -1,
        multipath_index: -1,
        pseudorange_rms_error_index: -1,
    };
}

impl Default for RrlpThresholds {
    fn default() -> Self {
        Self::DONT_CARE
    }
}

/// A GNSS receiver, stand-alone or reached through a cellular module.
pub trait GnssBackend {
    /// Block until a fix is available, the receiver's own timeout expires or
    /// `keep_going` returns `false`.
    fn get(&mut self, device: DeviceHandle, keep_going: Option<KeepGoing<'_>>) -> Result<RawFix, Error>;

    /// Begin a single fix; exactly one [`BackendEvent::Gnss`] follows.
    fn start(&mut self, device: DeviceHandle) -> Result<(), Error>;

    /// Begin streaming fixes every `period_ms`; a [`BackendEvent::Gnss`]
    /// follows each one until [`streamed_stop`](GnssBackend::streamed_stop).
    fn streamed_start(&mut self, device: DeviceHandle, period_ms: u32) -> Result<(), Error>;

    /// Cancel a fix begun with [`start`](GnssBackend::start).
    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error>;

    /// Cancel streaming.
    fn streamed_stop(&mut self, device: DeviceHandle) -> Result<(), Error>;

    /// Fill `buffer` with raw RRLP measurements meeting `thresholds`,
    /// returning the number of bytes written.
    fn get_rrlp(
        &mut self,
        device: DeviceHandle,
        buffer: &mut [u8],
        thresholds: &RrlpThresholds,
        keep_going: Option<KeepGoing<'_>>,
    ) -> Result<usize, Error>;
}

/// The Cell Locate service of a cellular module.
pub trait CellLocateBackend {
    /// Accuracy the module should aim for.
    fn set_desired_accuracy(&mut self, device: DeviceHandle, millimetres: i32) -> Result<(), Error>;

    /// How long the module may take over a fix.
    fn set_desired_fix_timeout(&mut self, device: DeviceHandle, seconds: i32) -> Result<(), Error>;

    /// Whether the module may use a GNSS receiver attached to it.
    fn set_gnss_enable(&mut self, device: DeviceHandle, enable: bool) -> Result<(), Error>;

    /// Block until a fix is available, it fails or `keep_going` returns `false`.
    fn get(&mut self, device: DeviceHandle, keep_going: Option<KeepGoing<'_>>) -> Result<RawFix, Error>;

    /// Begin a fix; exactly one [`BackendEvent::CellLocate`] follows.
    fn start(&mut self, device: DeviceHandle) -> Result<(), Error>;

    /// Cancel a fix.
    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error>;

    /// Progress of the current fix.
    fn status(&mut self, device: DeviceHandle) -> Result<LocationStatus, Error>;
}

/// Wi-Fi positioning through a cloud service.
///
/// The backend needs the full [`WifiSettings`] on every start; nothing is
/// remembered between requests.
pub trait WifiBackend {
    /// Scan, query the service and block for the answer.
    fn get(
        &mut self,
        device: DeviceHandle,
        settings: &WifiSettings,
        keep_going: Option<KeepGoing<'_>>,
    ) -> Result<Location, Error>;

    /// Begin a request; exactly one [`BackendEvent::Wifi`] follows.
    /// May fail with [`Error::Busy`] or [`Error::NoMemory`] while a previous
    /// request is being torn down.
    fn start(&mut self, device: DeviceHandle, settings: &WifiSettings) -> Result<(), Error>;

    /// Cancel a request.
    fn stop(&mut self, device: DeviceHandle) -> Result<(), Error>;
}

/// A completion reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A GNSS fix attempt finished. On failure only `fix.time_utc` may be
    /// meaningful.
    Gnss {
        /// Device that produced the fix.
        device: DeviceHandle,
        /// Outcome of the attempt.
        result: Result<(), Error>,
        /// Reported fields.
        fix: RawFix,
    },
    /// A Cell Locate fix attempt finished.
    CellLocate {
        /// Device that produced the fix.
        device: DeviceHandle,
        /// The fix, or why there is none.
        result: Result<RawFix, Error>,
    },
    /// A Wi-Fi location request finished.
    Wifi {
        /// Device that produced the fix.
        device: DeviceHandle,
        /// Outcome of the request.
        result: Result<(), Error>,
        /// The location, if the backend produced one.
        location: Option<Location>,
    },
}

impl BackendEvent {
    /// Device the event belongs to.
    pub fn device(&self) -> DeviceHandle {
        match self {
            BackendEvent::Gnss { device, .. }
            | BackendEvent::CellLocate { device, .. }
            | BackendEvent::Wifi { device, .. } => *device,
        }
    }
}

/// The set of backends and the delay source a [`LocationService`]
/// drives.
///
/// Fields are public so that a deployment can reach its drivers directly
/// (through [`LocationService::with_backends`]) for anything outside the
/// location API.
///
/// [`LocationService`]: super::LocationService
/// [`LocationService::with_backends`]: super::LocationService::with_backends
#[derive(Debug)]
pub struct Backends<G, C, W, D> {
    /// GNSS receiver driver.
    pub gnss: G,
    /// Cell Locate driver.
    pub cell: C,
    /// Wi-Fi positioning driver.
    pub wifi: W,
    /// Blocking delay used between polls and retries.
    pub delay: D,
}

impl<G, C, W, D> Backends<G, C, W, D>
where
    G: GnssBackend,
    C: CellLocateBackend,
    W: WifiBackend,
    D: DelayNs,
{
    /// Bundle the drivers.
    pub const fn new(gnss: G, cell: C, wifi: W, delay: D) -> Self {
        Self {
            gnss,
            cell,
            wifi,
            delay,
        }
    }
}

/// Stand-in for a technology a deployment does not have; every call fails
/// with [`Error::NotSupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl GnssBackend for Unsupported {
    fn get(&mut self, _: DeviceHandle, _: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        Err(Error::NotSupported)
    }

    fn start(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn streamed_start(&mut self, _: DeviceHandle, _: u32) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn streamed_stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn get_rrlp(
        &mut self,
        _: DeviceHandle,
        _: &mut [u8],
        _: &RrlpThresholds,
        _: Option<KeepGoing<'_>>,
    ) -> Result<usize, Error> {
        Err(Error::NotSupported)
    }
}

impl CellLocateBackend for Unsupported {
    fn set_desired_accuracy(&mut self, _: DeviceHandle, _: i32) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn set_desired_fix_timeout(&mut self, _: DeviceHandle, _: i32) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn set_gnss_enable(&mut self, _: DeviceHandle, _: bool) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn get(&mut self, _: DeviceHandle, _: Option<KeepGoing<'_>>) -> Result<RawFix, Error> {
        Err(Error::NotSupported)
    }

    fn start(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn status(&mut self, _: DeviceHandle) -> Result<LocationStatus, Error> {
        Err(Error::NotSupported)
    }
}

impl WifiBackend for Unsupported {
    fn get(
        &mut self,
        _: DeviceHandle,
        _: &WifiSettings,
        _: Option<KeepGoing<'_>>,
    ) -> Result<Location, Error> {
        Err(Error::NotSupported)
    }

    fn start(&mut self, _: DeviceHandle, _: &WifiSettings) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn stop(&mut self, _: DeviceHandle) -> Result<(), Error> {
        Err(Error::NotSupported)
    }
}
