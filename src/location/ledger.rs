//! Bookkeeping of asynchronous location requests awaiting a backend
//! completion.
//!
//! There is one FIFO per backend kind. A request is pushed when the façade
//! starts a backend and taken again when that backend reports back, so the
//! completion handler can find the application callback and the repeat
//! period of the request it belongs to.
//!
//! The ledger does no locking of its own. It is owned by
//! [`LocationService`](super::LocationService) and only ever touched while
//! the service lock is held.

use heapless::{Deque, Vec};

use super::error::Error;
use super::{DeviceHandle, LocationCallback, LocationType, WifiSettings};

/// Capacity of each per-kind queue.
pub const LEDGER_DEPTH: usize = 4;

/// Devices per kind whose last request is remembered as completed; the
/// oldest is forgotten first.
pub const COMPLETED_DEPTH: usize = 8;

const KIND_COUNT: usize = 3;

/// The backend queues of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerKind {
    /// GNSS, stand-alone or tunnelled through a cellular module.
    Gnss,
    /// Cell Locate.
    CellLocate,
    /// Google, Skyhook and Here via Wi-Fi.
    Wifi,
}

impl LedgerKind {
    /// The queue that records requests of `location_type`.
    ///
    /// [`LocationType::None`] and [`LocationType::CloudCloudLocate`] have no
    /// queue: Cloud Locate is synchronous only.
    pub fn for_location_type(location_type: LocationType) -> Option<Self> {
        match location_type {
            LocationType::Gnss => Some(LedgerKind::Gnss),
            LocationType::CloudCellLocate => Some(LedgerKind::CellLocate),
            LocationType::CloudGoogle | LocationType::CloudSkyhook | LocationType::CloudHere => {
                Some(LedgerKind::Wifi)
            }
            LocationType::None | LocationType::CloudCloudLocate => None,
        }
    }

    fn index(self) -> usize {
        match self {
            LedgerKind::Gnss => 0,
            LedgerKind::CellLocate => 1,
            LedgerKind::Wifi => 2,
        }
    }
}

/// Where a (device, kind) pair is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Nothing requested, or stopped.
    Idle,
    /// A request is waiting for its backend.
    Pending,
    /// The last request finished and was not re-armed.
    Completed,
}

/// An in-flight asynchronous request.
#[derive(Debug, Clone)]
pub struct LocationRequest {
    /// Device the request was issued on.
    pub device: DeviceHandle,
    /// Technology requested.
    pub location_type: LocationType,
    /// Repeat period in milliseconds; `0` for a one-shot request.
    pub period_ms: u32,
    /// Settings a Wi-Fi backend needs to be re-armed.
    pub wifi: Option<WifiSettings>,
    /// Application callback.
    pub callback: LocationCallback,
}

impl LocationRequest {
    /// True if the request re-arms after each result.
    pub fn is_continuous(&self) -> bool {
        self.period_ms > 0
    }
}

/// Per-kind FIFOs of in-flight requests.
#[derive(Debug)]
pub struct Ledger {
    queues: [Deque<LocationRequest, LEDGER_DEPTH>; KIND_COUNT],
    completed: [Vec<DeviceHandle, COMPLETED_DEPTH>; KIND_COUNT],
    generation: [u32; KIND_COUNT],
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An empty ledger.
    pub const fn new() -> Self {
        Self {
            queues: [Deque::new(), Deque::new(), Deque::new()],
            completed: [Vec::new(), Vec::new(), Vec::new()],
            generation: [0; KIND_COUNT],
        }
    }

    /// Append `request` to the queue of its location type.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidParameter`] if the location type has no queue.
    /// * [`Error::NoMemory`] if that queue is full.
    pub fn push(&mut self, request: LocationRequest) -> Result<LedgerKind, Error> {
        let kind = LedgerKind::for_location_type(request.location_type).ok_or(Error::InvalidParameter)?;
        self.queues[kind.index()]
            .push_back(request)
            .map_err(|_| Error::NoMemory)?;
        Ok(kind)
    }

    /// Remove and return the oldest request of `kind`.
    pub fn pop(&mut self, kind: LedgerKind) -> Option<LocationRequest> {
        self.queues[kind.index()].pop_front()
    }

    /// Remove and return the newest request of `kind`; undoes a
    /// [`push`](Ledger::push) whose backend start failed.
    pub fn retract(&mut self, kind: LedgerKind) -> Option<LocationRequest> {
        self.queues[kind.index()].pop_back()
    }

    /// Remove and return the oldest request of `kind` issued on `device`,
    /// keeping the order of the others, and mark the pair completed.
    pub fn take(&mut self, kind: LedgerKind, device: DeviceHandle) -> Option<LocationRequest> {
        let queue = &mut self.queues[kind.index()];
        let mut found = None;
        for _ in 0..queue.len() {
            let Some(request) = queue.pop_front() else {
                break;
            };
            if found.is_none() && request.device == device {
                found = Some(request);
            } else if queue.push_back(request).is_err() {
                // A slot was just freed, so this cannot happen.
                break;
            }
        }
        if found.is_some() {
            self.mark_completed(kind, device);
        }
        found
    }

    /// Drop every request of `kind` issued on `device`, returning how many
    /// there were. The pair goes back to [`RequestState::Idle`] and any
    /// re-arm racing with this removal is cancelled.
    pub fn remove_device(&mut self, kind: LedgerKind, device: DeviceHandle) -> usize {
        let queue = &mut self.queues[kind.index()];
        let mut removed = 0;
        for _ in 0..queue.len() {
            let Some(request) = queue.pop_front() else {
                break;
            };
            if request.device == device {
                removed += 1;
            } else if queue.push_back(request).is_err() {
                break;
            }
        }
        self.completed[kind.index()].retain(|d| *d != device);
        self.generation[kind.index()] = self.generation[kind.index()].wrapping_add(1);
        removed
    }

    /// Number of requests queued for `kind`.
    pub fn len(&self, kind: LedgerKind) -> usize {
        self.queues[kind.index()].len()
    }

    /// True if no request of any kind is queued.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// True if `device` has a request of `kind` queued.
    pub fn is_pending(&self, kind: LedgerKind, device: DeviceHandle) -> bool {
        self.queues[kind.index()].iter().any(|r| r.device == device)
    }

    /// Where `device` is in its `kind` request cycle.
    pub fn state(&self, kind: LedgerKind, device: DeviceHandle) -> RequestState {
        if self.is_pending(kind, device) {
            RequestState::Pending
        } else if self.completed[kind.index()].contains(&device) {
            RequestState::Completed
        } else {
            RequestState::Idle
        }
    }

    /// Counter bumped by every removal; a completion handler compares it
    /// across the application callback to notice a stop issued from there.
    pub fn generation(&self, kind: LedgerKind) -> u32 {
        self.generation[kind.index()]
    }

    fn mark_completed(&mut self, kind: LedgerKind, device: DeviceHandle) {
        let completed = &mut self.completed[kind.index()];
        if completed.contains(&device) {
            return;
        }
        if completed.is_full() {
            completed.remove(0);
        }
        // room was made above
        let _ = completed.push(device);
    }

    /// Drop every request of every kind.
    pub fn clear(&mut self) {
        for queue in self.queues.iter_mut() {
            queue.clear();
        }
        for completed in self.completed.iter_mut() {
            completed.clear();
        }
        for generation in self.generation.iter_mut() {
            *generation = generation.wrapping_add(1);
        }
    }
}
