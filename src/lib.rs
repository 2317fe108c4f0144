//! # ulocate - location arbitration for u-blox style IoT modules
//!
//! One API for establishing position, whichever module and technology
//! provides it:
//!
//! - **GNSS**: a stand-alone receiver, or one tunnelled through a cellular module
//! - **Cell Locate**: the cellular module's cloud-assisted positioning
//! - **Wi-Fi**: access-point scans resolved by Google, Skyhook or HERE
//! - **Cloud Locate**: raw GNSS measurements sent over MQTT and solved in the cloud
//!
//! Requests may block, complete once through a callback, or repeat
//! periodically until stopped. The drivers for each technology are supplied
//! by the application through the traits in [`location::backend`].
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ulocate = "0.1.0"
//! ```
//!
//! ### Blocking GNSS fix
//!
//! ```rust,no_run
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use ulocate::location::{
//!     Backends, DeviceHandle, DeviceType, LocationService, LocationType, Unsupported,
//! };
//! # struct Delay;
//! # impl embedded_hal::delay::DelayNs for Delay {
//! #     fn delay_ns(&mut self, _ns: u32) {}
//! # }
//!
//! let backends = Backends::new(Unsupported, Unsupported, Unsupported, Delay);
//! let service: LocationService<NoopRawMutex, _, _, _, _> = LocationService::new(backends);
//! service.init();
//!
//! let receiver = DeviceHandle::new(0, DeviceType::Gnss);
//! match service.get(receiver, LocationType::Gnss, None, None) {
//!     Ok(location) => { let _ = location.latitude_x1e7; }
//!     Err(e) => { let _ = e.code(); }
//! }
//! ```
//!
//! ## Platform Support
//!
//! The crate is `no_std` and allocation free: every queue, topic and buffer
//! has a fixed capacity. The service's lock is held across blocking backend
//! calls, so it must be a thread-blocking raw mutex: `NoopRawMutex` for a
//! single task, or one backed by an RTOS mutex when completions come from
//! other tasks. A lock that masks interrupts would starve the drivers the
//! backends wait on, and completions must never be delivered from an
//! interrupt handler.
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt formatting of errors and public enums

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Location requests: the façade, the request ledger, backend contracts
/// and Cloud Locate.
pub mod location;

/// The MQTT session contract Cloud Locate publishes through.
pub mod network;

/// Calendar arithmetic for converting UTC timestamps.
pub mod time;
