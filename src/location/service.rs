//! The location façade.
//!
//! [`LocationService`] owns the request ledger, the backends and a single
//! service-wide lock. Every public operation and every backend completion
//! runs under that lock:
//!
//! * a blocking [`get`](LocationService::get) keeps it for the whole
//!   backend call, so no other location operation can start meanwhile;
//! * asynchronous starts push a ledger entry and start the backend;
//! * [`complete`](LocationService::complete) takes the entry back, calls the
//!   application and re-arms continuous requests.
//!
//! The lock is an [`embassy_sync`] blocking mutex over a caller-chosen
//! [`RawMutex`]. It is held across blocking backend calls, Cloud Locate
//! polling and Wi-Fi restart pauses, so `M` must block threads rather than
//! mask interrupts: `NoopRawMutex` when everything runs in one task, or a
//! raw mutex over an RTOS mutex when completions come from other tasks.
//! `CriticalSectionRawMutex` only qualifies where the critical section is
//! itself a thread lock, as with the `critical-section` `std`
//! implementation. Completions must be delivered from task context, never
//! from an interrupt handler. Internal state is only borrowed for short
//! sections and never across an application callback, so a callback may
//! start a new request.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::backend::{
    BackendEvent, Backends, CellLocateBackend, GnssBackend, KeepGoing, RawFix, WifiBackend,
};
use super::cloud_locate::{self, CloudLocateConfig, CloudLocateRequest};
use super::error::Error;
use super::ledger::{Ledger, LedgerKind, LocationRequest, RequestState};
use super::{
    DeviceHandle, DeviceType, Location, LocationAssist, LocationCallback, LocationStatus,
    LocationType, WifiSettings,
};

/// Attempts made to restart a continuous Wi-Fi request.
pub const WIFI_RESTART_ATTEMPTS: usize = 10;

/// Pause between Wi-Fi restart attempts.
pub const WIFI_RESTART_DELAY_MS: u32 = 1000;

struct Inner<G, C, W, D> {
    initialised: Cell<bool>,
    config: CloudLocateConfig,
    ledger: RefCell<Ledger>,
    backends: RefCell<Backends<G, C, W, D>>,
}

/// Single entry point for location requests on any device.
///
/// Construct it with [`new`](LocationService::new), which is `const` so the
/// service can live in a `static`, then call [`init`](LocationService::init)
/// before use.
pub struct LocationService<M: RawMutex, G, C, W, D> {
    inner: Mutex<M, Inner<G, C, W, D>>,
}

impl<M: RawMutex, G, C, W, D> core::fmt::Debug for LocationService<M, G, C, W, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocationService").finish_non_exhaustive()
    }
}

impl<M, G, C, W, D> LocationService<M, G, C, W, D>
where
    M: RawMutex,
    G: GnssBackend,
    C: CellLocateBackend,
    W: WifiBackend,
    D: DelayNs,
{
    /// A service driving `backends`, talking to the public Cloud Locate
    /// service.
    pub const fn new(backends: Backends<G, C, W, D>) -> Self {
        Self::with_config(backends, CloudLocateConfig::DEFAULT)
    }

    /// A service with its own Cloud Locate topics and timing.
    pub const fn with_config(backends: Backends<G, C, W, D>, config: CloudLocateConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                initialised: Cell::new(false),
                config,
                ledger: RefCell::new(Ledger::new()),
                backends: RefCell::new(backends),
            }),
        }
    }

    /// Make the service usable. Calling it again has no effect.
    pub fn init(&self) {
        self.inner.lock(|inner| {
            if !inner.initialised.replace(true) {
                info!("location service initialised");
            }
        });
    }

    /// Drop every pending request and make the service unusable until the
    /// next [`init`](LocationService::init).
    ///
    /// Backends are not stopped; stop them first with
    /// [`get_stop`](LocationService::get_stop) if they may still report.
    pub fn deinit(&self) {
        self.inner.lock(|inner| {
            inner.ledger.borrow_mut().clear();
            if inner.initialised.replace(false) {
                info!("location service deinitialised");
            }
        });
    }

    /// True between [`init`](LocationService::init) and
    /// [`deinit`](LocationService::deinit).
    pub fn is_initialised(&self) -> bool {
        self.inner.lock(|inner| inner.initialised.get())
    }

    /// Run `f` on the backends under the service lock.
    pub fn with_backends<R>(&self, f: impl FnOnce(&mut Backends<G, C, W, D>) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.backends.borrow_mut()))
    }

    /// Number of requests of `kind` waiting for their backend.
    pub fn pending(&self, kind: LedgerKind) -> usize {
        self.inner.lock(|inner| inner.ledger.borrow().len(kind))
    }

    /// Where `device` is in its `kind` request cycle.
    pub fn request_state(&self, device: DeviceHandle, kind: LedgerKind) -> RequestState {
        self.inner.lock(|inner| inner.ledger.borrow().state(kind, device))
    }

    /// Establish a location, blocking until it is known or the request fails.
    ///
    /// The service lock is held throughout, so no other location operation
    /// can run until this returns. `keep_going` is polled by the backend and
    /// may end the wait early; without it the backend's own timeout applies.
    ///
    /// A Cloud Locate request with [`LocationAssist::publish_only`] set
    /// returns as soon as the measurements are published, with every field
    /// of the location unknown.
    ///
    /// # Errors
    ///
    /// * [`Error::NotInitialised`] before [`init`](LocationService::init).
    /// * [`Error::NotSupported`] if no backend serves `device` for `location_type`.
    /// * [`Error::InvalidParameter`] if `assist` lacks what the location type needs.
    /// * Backend and MQTT errors, unchanged.
    pub fn get(
        &self,
        device: DeviceHandle,
        location_type: LocationType,
        assist: Option<&mut LocationAssist<'_>>,
        keep_going: Option<KeepGoing<'_>>,
    ) -> Result<Location, Error> {
        self.inner.lock(|inner| {
            if !inner.initialised.get() {
                return Err(Error::NotInitialised);
            }
            debug!("location get: device {} type {}", device.id, location_type);
            let mut backends = inner.backends.borrow_mut();
            let backends = &mut *backends;
            match (device.device_type, location_type) {
                (DeviceType::Gnss | DeviceType::Cellular, LocationType::Gnss) => backends
                    .gnss
                    .get(device, keep_going)
                    .map(|fix| Location::from_fix(LocationType::Gnss, &fix)),
                (DeviceType::Cellular, LocationType::CloudCellLocate) => {
                    if let Some(assist) = assist.as_deref() {
                        configure_cell_locate(&mut backends.cell, device, assist)?;
                    }
                    backends
                        .cell
                        .get(device, keep_going)
                        .map(|fix| Location::from_fix(LocationType::CloudCellLocate, &fix))
                }
                (DeviceType::Cellular, LocationType::CloudCloudLocate) => {
                    let assist = assist.ok_or(Error::InvalidParameter)?;
                    let request = CloudLocateRequest {
                        device,
                        gnss_device: device,
                        thresholds: assist.rrlp_thresholds(),
                        client_id: assist.client_id,
                        want_location: !assist.publish_only,
                    };
                    let mqtt = assist.mqtt.as_deref_mut().ok_or(Error::InvalidParameter)?;
                    let location = cloud_locate::locate(
                        &inner.config,
                        &mut backends.gnss,
                        mqtt,
                        &mut backends.delay,
                        &request,
                        keep_going,
                    )?;
                    match location {
                        Some(location) => Ok(location),
                        None if !request.want_location => Ok(Location::unknown(LocationType::CloudCloudLocate)),
                        None => Err(Error::Unknown),
                    }
                }
                (DeviceType::ShortRange, t) if t.is_wifi() => {
                    let assist = assist.ok_or(Error::InvalidParameter)?;
                    let settings = WifiSettings::from_assist(t, assist)?;
                    backends.wifi.get(device, &settings, keep_going)
                }
                _ => Err(Error::NotSupported),
            }
        })
    }

    /// Start a one-shot asynchronous request; `callback` is called once
    /// with the result.
    ///
    /// # Errors
    ///
    /// As [`get`](LocationService::get), plus [`Error::NoMemory`] if too
    /// many requests are already pending for the backend.
    /// [`LocationType::CloudCloudLocate`] is synchronous only and fails with
    /// [`Error::NotSupported`].
    pub fn get_start(
        &self,
        device: DeviceHandle,
        location_type: LocationType,
        assist: Option<&LocationAssist<'_>>,
        callback: LocationCallback,
    ) -> Result<(), Error> {
        self.start_request(device, 0, location_type, assist, callback)
    }

    /// Start a continuous asynchronous request; `callback` is called with
    /// every result, roughly every `period_ms`, until
    /// [`get_stop`](LocationService::get_stop).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `period_ms` is zero, otherwise as
    /// [`get_start`](LocationService::get_start).
    pub fn get_continuous_start(
        &self,
        device: DeviceHandle,
        period_ms: u32,
        location_type: LocationType,
        assist: Option<&LocationAssist<'_>>,
        callback: LocationCallback,
    ) -> Result<(), Error> {
        if period_ms == 0 {
            return Err(Error::InvalidParameter);
        }
        self.start_request(device, period_ms, location_type, assist, callback)
    }

    fn start_request(
        &self,
        device: DeviceHandle,
        period_ms: u32,
        location_type: LocationType,
        assist: Option<&LocationAssist<'_>>,
        callback: LocationCallback,
    ) -> Result<(), Error> {
        self.inner.lock(|inner| {
            if !inner.initialised.get() {
                return Err(Error::NotInitialised);
            }
            let wifi = match (device.device_type, location_type) {
                (DeviceType::Gnss | DeviceType::Cellular, LocationType::Gnss)
                | (DeviceType::Cellular, LocationType::CloudCellLocate) => None,
                (DeviceType::ShortRange, t) if t.is_wifi() => {
                    let assist = assist.ok_or(Error::InvalidParameter)?;
                    Some(WifiSettings::from_assist(t, assist)?)
                }
                _ => return Err(Error::NotSupported),
            };

            let request = LocationRequest {
                device,
                location_type,
                period_ms,
                wifi,
                callback,
            };
            let kind = inner.ledger.borrow_mut().push(request.clone())?;

            let started = {
                let mut backends = inner.backends.borrow_mut();
                match kind {
                    LedgerKind::Gnss if period_ms > 0 => backends.gnss.streamed_start(device, period_ms),
                    LedgerKind::Gnss => backends.gnss.start(device),
                    LedgerKind::CellLocate => match assist {
                        Some(assist) => configure_cell_locate(&mut backends.cell, device, assist)
                            .and_then(|()| backends.cell.start(device)),
                        None => backends.cell.start(device),
                    },
                    LedgerKind::Wifi => match request.wifi.as_ref() {
                        Some(settings) => backends.wifi.start(device, settings),
                        None => Err(Error::InvalidParameter),
                    },
                }
            };

            match started {
                Ok(()) => {
                    info!(
                        "location start: device {} type {} period {} ms",
                        device.id, location_type, period_ms
                    );
                    Ok(())
                }
                Err(e) => {
                    inner.ledger.borrow_mut().retract(kind);
                    warn!("location start: device {} type {} failed: {}", device.id, location_type, e);
                    Err(e)
                }
            }
        })
    }

    /// Progress of an asynchronous request.
    ///
    /// Only Cell Locate reports progress; GNSS devices always answer
    /// [`LocationStatus::Unknown`].
    pub fn get_status(&self, device: DeviceHandle) -> Result<LocationStatus, Error> {
        self.inner.lock(|inner| {
            if !inner.initialised.get() {
                return Err(Error::NotInitialised);
            }
            match device.device_type {
                DeviceType::Cellular => inner.backends.borrow_mut().cell.status(device),
                DeviceType::Gnss => Ok(LocationStatus::Unknown),
                _ => Err(Error::NotSupported),
            }
        })
    }

    /// Cancel every asynchronous request on `device`.
    ///
    /// Pending requests are forgotten without calling their callbacks.
    /// Backends are stopped best-effort: a cellular device has Cell Locate
    /// and both GNSS modes stopped, since GNSS may be tunnelled through it.
    pub fn get_stop(&self, device: DeviceHandle) -> Result<(), Error> {
        self.inner.lock(|inner| {
            if !inner.initialised.get() {
                return Err(Error::NotInitialised);
            }
            let kinds: &[LedgerKind] = match device.device_type {
                DeviceType::Cellular => &[LedgerKind::Gnss, LedgerKind::CellLocate],
                DeviceType::Gnss => &[LedgerKind::Gnss],
                DeviceType::ShortRange => &[LedgerKind::Wifi],
                DeviceType::ShortRangeOpenCpu => return Err(Error::NotSupported),
            };
            {
                let mut ledger = inner.ledger.borrow_mut();
                for &kind in kinds {
                    let removed = ledger.remove_device(kind, device);
                    if removed > 0 {
                        debug!("location stop: dropped {} {:?} request(s)", removed, kind);
                    }
                }
            }

            let mut backends = inner.backends.borrow_mut();
            let outcomes = match device.device_type {
                DeviceType::Cellular => [
                    backends.cell.stop(device),
                    backends.gnss.streamed_stop(device),
                    backends.gnss.stop(device),
                ],
                DeviceType::Gnss => [
                    backends.gnss.streamed_stop(device),
                    backends.gnss.stop(device),
                    Ok(()),
                ],
                _ => [backends.wifi.stop(device), Ok(()), Ok(())],
            };
            for e in outcomes.iter().filter_map(|r| r.as_ref().err()) {
                debug!("location stop: device {} backend said {}", device.id, e);
            }
            info!("location stop: device {}", device.id);
            Ok(())
        })
    }

    /// Hand a backend completion to the service.
    ///
    /// Call this from the backend's own context once a started request
    /// finishes. A completion nobody is waiting for is dropped.
    pub fn complete(&self, event: BackendEvent) {
        match event {
            BackendEvent::Gnss { device, result, fix } => self.on_gnss_result(device, result, &fix),
            BackendEvent::CellLocate { device, result } => self.on_cell_locate_result(device, result),
            BackendEvent::Wifi {
                device,
                result,
                location,
            } => self.on_wifi_result(device, result, location),
        }
    }

    /// A GNSS fix attempt finished.
    ///
    /// The application always receives a location: on failure every field
    /// is unknown except the time, which is kept if the receiver knew it.
    /// A continuous request is re-entered in the ledger; the receiver is
    /// already streaming so it is not restarted.
    pub fn on_gnss_result(&self, device: DeviceHandle, result: Result<(), Error>, fix: &RawFix) {
        self.inner.lock(|inner| {
            let Some((request, generation)) = take_request(inner, LedgerKind::Gnss, device) else {
                return;
            };
            let location = match result {
                Ok(()) => Location::from_fix(request.location_type, fix),
                Err(_) => {
                    let mut location = Location::unknown(request.location_type);
                    if fix.time_utc >= 0 {
                        location.time_utc = fix.time_utc;
                    }
                    location
                }
            };

            (request.callback)(device, result, Some(&location));

            if rearm_allowed(inner, LedgerKind::Gnss, &request, generation) {
                if let Err(e) = inner.ledger.borrow_mut().push(request) {
                    warn!("location: GNSS re-arm for device {} failed: {}", device.id, e);
                }
            }
        });
    }

    /// A Cell Locate fix attempt finished.
    ///
    /// On failure the application receives no location. A continuous
    /// request restarts the backend, which does not repeat by itself.
    pub fn on_cell_locate_result(&self, device: DeviceHandle, result: Result<RawFix, Error>) {
        self.inner.lock(|inner| {
            let Some((request, generation)) = take_request(inner, LedgerKind::CellLocate, device) else {
                return;
            };
            let location = result
                .as_ref()
                .ok()
                .map(|fix| Location::from_fix(request.location_type, fix));

            (request.callback)(device, result.map(|_| ()), location.as_ref());

            if rearm_allowed(inner, LedgerKind::CellLocate, &request, generation) {
                if let Err(e) = inner.ledger.borrow_mut().push(request) {
                    warn!("location: Cell Locate re-arm for device {} failed: {}", device.id, e);
                    return;
                }
                let restarted = inner.backends.borrow_mut().cell.start(device);
                if let Err(e) = restarted {
                    inner.ledger.borrow_mut().retract(LedgerKind::CellLocate);
                    warn!("location: Cell Locate restart for device {} failed: {}", device.id, e);
                }
            }
        });
    }

    /// A Wi-Fi location request finished.
    ///
    /// The result is passed on as reported. A continuous request restarts
    /// the backend with the stored settings, retrying up to
    /// [`WIFI_RESTART_ATTEMPTS`] times while the backend reports
    /// [`Error::Busy`] or [`Error::NoMemory`] from tearing down the previous
    /// request. Any other error ends the request at once.
    pub fn on_wifi_result(&self, device: DeviceHandle, result: Result<(), Error>, location: Option<Location>) {
        self.inner.lock(|inner| {
            let Some((request, generation)) = take_request(inner, LedgerKind::Wifi, device) else {
                return;
            };

            (request.callback)(device, result, location.as_ref());

            if !rearm_allowed(inner, LedgerKind::Wifi, &request, generation) {
                return;
            }
            let Some(settings) = request.wifi.clone() else {
                warn!("location: Wi-Fi request for device {} has no settings", device.id);
                return;
            };
            if let Err(e) = inner.ledger.borrow_mut().push(request) {
                warn!("location: Wi-Fi re-arm for device {} failed: {}", device.id, e);
                return;
            }

            let mut backends = inner.backends.borrow_mut();
            let mut outcome = Err(Error::Unknown);
            for attempt in 1..=WIFI_RESTART_ATTEMPTS {
                outcome = backends.wifi.start(device, &settings);
                match outcome {
                    Ok(()) => break,
                    Err(e @ (Error::Busy | Error::NoMemory)) => {
                        debug!("location: Wi-Fi restart attempt {} failed: {}", attempt, e);
                        if attempt < WIFI_RESTART_ATTEMPTS {
                            backends.delay.delay_ms(WIFI_RESTART_DELAY_MS);
                        }
                    }
                    Err(_) => break,
                }
            }
            if let Err(e) = outcome {
                inner.ledger.borrow_mut().retract(LedgerKind::Wifi);
                warn!("location: Wi-Fi restart for device {} gave up: {}", device.id, e);
            }
        });
    }
}

fn configure_cell_locate<C: CellLocateBackend>(
    cell: &mut C,
    device: DeviceHandle,
    assist: &LocationAssist<'_>,
) -> Result<(), Error> {
    if assist.desired_accuracy_millimetres >= 0 {
        cell.set_desired_accuracy(device, assist.desired_accuracy_millimetres)?;
    }
    if assist.desired_timeout_seconds >= 0 {
        cell.set_desired_fix_timeout(device, assist.desired_timeout_seconds)?;
    }
    cell.set_gnss_enable(device, !assist.disable_gnss)
}

/// Take the request a completion belongs to, with the ledger generation
/// observed at that moment.
fn take_request<G, C, W, D>(
    inner: &Inner<G, C, W, D>,
    kind: LedgerKind,
    device: DeviceHandle,
) -> Option<(LocationRequest, u32)> {
    if !inner.initialised.get() {
        warn!("location: {:?} completion while not initialised", kind);
        return None;
    }
    let mut ledger = inner.ledger.borrow_mut();
    match ledger.take(kind, device) {
        Some(request) => Some((request, ledger.generation(kind))),
        None => {
            debug!("location: unexpected {:?} completion for device {}", kind, device.id);
            None
        }
    }
}

/// A continuous request re-arms unless the service was stopped or shut
/// down from inside the application callback.
fn rearm_allowed<G, C, W, D>(
    inner: &Inner<G, C, W, D>,
    kind: LedgerKind,
    request: &LocationRequest,
    generation: u32,
) -> bool {
    request.is_continuous()
        && inner.initialised.get()
        && inner.ledger.borrow().generation(kind) == generation
}
